use std::io::Cursor;

/// Date the photo was taken according to its EXIF data, as `YYYY-MM-DD`.
///
/// Looks at DateTimeOriginal first and falls back to DateTime. Returns
/// `None` for files without readable EXIF or with a zeroed date.
pub fn exif_date_taken(bytes: &[u8]) -> Option<String> {
    let mut reader = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;

    [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .into_iter()
        .find_map(|tag| {
            let field = exif.get_field(tag, exif::In::PRIMARY)?;
            match field.value {
                exif::Value::Ascii(ref parts) => parts.first().and_then(|raw| parse_exif_date(raw)),
                _ => None,
            }
        })
}

fn parse_exif_date(raw: &[u8]) -> Option<String> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    if dt.year == 0 || dt.month == 0 || dt.day == 0 {
        return None;
    }
    Some(format!("{:04}-{:02}-{:02}", dt.year, dt.month, dt.day))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exif_date() {
        assert_eq!(parse_exif_date(b"2023:07:14 10:11:12"), Some("2023-07-14".to_string()));
        assert_eq!(parse_exif_date(b"0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_date(b"garbage"), None);
    }

    #[test]
    fn test_no_exif() {
        assert_eq!(exif_date_taken(b"not an image"), None);
    }
}
