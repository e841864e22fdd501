//! Server-rendered HTML pages.
//!
//! Pages are plain strings built with `format!`. Every value that comes from
//! a user or from the database goes through [`escape`].

use axum::http::StatusCode;

use crate::archive::{FaceView, ImageDetail, ImageSummary, SearchOutcome, UploadOutcome};
use crate::db::ImageRecord;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em auto; max-width: 960px; }
nav a { margin-right: 1em; }
.notice { background: #eef6ee; border: 1px solid #9c9; padding: .5em 1em; }
.error { background: #fbeeee; border: 1px solid #c99; padding: .5em 1em; }
.photo { position: relative; display: inline-block; }
.photo img { max-width: 100%; display: block; }
.box { position: absolute; border: 2px solid #ffd400; }
.box.highlight { border-color: #ff2d55; border-width: 4px; }
.box span { background: rgba(0,0,0,.6); color: #fff; font-size: 12px; position: absolute; top: 100%; left: 0; white-space: nowrap; }
.faces img { height: 96px; margin-right: .5em; }
table { border-collapse: collapse; }
td, th { padding: .3em .6em; border-bottom: 1px solid #ddd; text-align: left; vertical-align: top; }
td img { max-height: 80px; }
"#;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn or_dash(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "&ndash;".to_string())
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - Bildarkiv</title>
<style>{STYLE}</style>
</head>
<body>
<nav><a href="/">Upload</a><a href="/gallery">Gallery</a><a href="/search">Search</a></nav>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = escape(title),
        STYLE = STYLE,
        body = body,
    )
}

pub fn render_home() -> String {
    let body = r#"<form method="post" action="/" enctype="multipart/form-data">
<p><label>Photo <input type="file" name="file" accept="image/*" required></label></p>
<p><label>Date taken <input type="date" name="date_taken"></label></p>
<p><label>Place taken <input type="text" name="place_taken"></label></p>
<p><label>Description <textarea name="description" rows="3" cols="40"></textarea></label></p>
<p><button type="submit">Upload</button></p>
</form>"#;
    layout("Upload a photo", body)
}

fn metadata_list(image: &ImageRecord) -> String {
    format!(
        "<dl><dt>Date taken</dt><dd>{}</dd><dt>Place</dt><dd>{}</dd><dt>Description</dt><dd>{}</dd><dt>Uploaded</dt><dd>{}</dd></dl>",
        or_dash(image.date_taken.as_deref()),
        or_dash(image.place_taken.as_deref()),
        or_dash(image.description.as_deref()),
        escape(&image.uploaded_at),
    )
}

pub fn render_upload_result(outcome: &UploadOutcome) -> String {
    let mut body = format!(
        r#"<p><img src="{}" alt="" style="max-width: 480px"></p>"#,
        escape(&outcome.image_url)
    );
    body.push_str(&metadata_list(&outcome.image));

    if outcome.faces.is_empty() {
        body.push_str(&format!(
            r#"<p>No faces were found in this photo. <a href="/result/{}">View it</a>.</p>"#,
            escape(&outcome.image.id)
        ));
        return layout("Upload complete", &body);
    }

    body.push_str(&format!(
        r#"<p>{} face(s) found. Enter comma separated names for each face.</p>
<form method="post" action="/identify/{}"><table class="faces">"#,
        outcome.faces.len(),
        escape(&outcome.image.id)
    ));
    for face in &outcome.faces {
        body.push_str(&format!(
            r#"<tr><td><img src="{}" alt="face {}"></td><td><input type="text" name="{}" size="40"></td></tr>"#,
            escape(&face.asset_url),
            face.id,
            face.id
        ));
    }
    body.push_str(r#"</table><p><button type="submit">Save names</button></p></form>"#);

    layout("Tag faces", &body)
}

fn percent(part: u32, whole: Option<u32>) -> f64 {
    match whole {
        Some(whole) if whole > 0 => f64::from(part) * 100.0 / f64::from(whole),
        _ => 0.0,
    }
}

fn face_box(image: &ImageRecord, face: &FaceView, label: Option<&str>, highlighted: bool) -> String {
    let bbox = face.bbox;
    format!(
        r#"<div class="box{}" style="left:{:.2}%;top:{:.2}%;width:{:.2}%;height:{:.2}%"><span>{}</span></div>"#,
        if highlighted { " highlight" } else { "" },
        percent(bbox.x, image.width),
        percent(bbox.y, image.height),
        percent(bbox.width, image.width),
        percent(bbox.height, image.height),
        label.map(escape).unwrap_or_default(),
    )
}

pub fn render_result(detail: &ImageDetail) -> String {
    let image = &detail.image;
    let mut body = String::new();

    if let Some(person) = &detail.highlight_person {
        body.push_str(&format!(
            r#"<p class="notice">Highlighting {}.</p>"#,
            escape(&person.name)
        ));
    }

    body.push_str(&format!(
        r#"<div class="photo"><img src="{}" alt="">"#,
        escape(&detail.image_url)
    ));
    for face in &detail.faces {
        let label = detail.names_by_face.get(&face.id).map(String::as_str);
        let highlighted = detail.highlight_face_ids.contains(&face.id);
        body.push_str(&face_box(image, face, label, highlighted));
    }
    body.push_str("</div>");
    body.push_str(&metadata_list(image));

    if !detail.faces.is_empty() {
        body.push_str(&format!(
            r#"<h2>Faces</h2><form method="post" action="/identify/{}"><table class="faces">"#,
            escape(&image.id)
        ));
        for face in &detail.faces {
            let names = detail
                .names_by_face
                .get(&face.id)
                .map(String::as_str)
                .unwrap_or_default();
            body.push_str(&format!(
                r#"<tr><td><img src="{}" alt="face {}"></td><td><input type="text" name="{}" value="{}" size="40"></td></tr>"#,
                escape(&face.asset_url),
                face.id,
                face.id,
                escape(names)
            ));
        }
        body.push_str(r#"</table><p><button type="submit">Save names</button></p></form>"#);
    }

    layout("Photo", &body)
}

fn summary_table(summaries: &[ImageSummary], highlight_person_id: Option<i64>) -> String {
    if summaries.is_empty() {
        return "<p>No photos.</p>".to_string();
    }

    let query = highlight_person_id
        .map(|id| format!("?highlight_person_id={}", id))
        .unwrap_or_default();

    let mut table = String::from(
        "<table><tr><th></th><th>Date</th><th>Place</th><th>Faces</th><th>People</th></tr>",
    );
    for summary in summaries {
        let image = &summary.image;
        table.push_str(&format!(
            r#"<tr><td><a href="/result/{id}{query}"><img src="{src}" alt=""></a></td><td>{date}</td><td>{place}</td><td>{faces}</td><td>{people}</td></tr>"#,
            id = escape(&image.id),
            query = query,
            src = escape(&summary.image_url),
            date = or_dash(image.date_taken.as_deref()),
            place = or_dash(image.place_taken.as_deref()),
            faces = summary.face_count,
            people = escape(&summary.people.join(", ")),
        ));
    }
    table.push_str("</table>");
    table
}

pub fn render_gallery(summaries: &[ImageSummary], notice: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(notice) = notice {
        body.push_str(&format!(r#"<p class="notice">{}</p>"#, escape(notice)));
    }
    body.push_str(&summary_table(summaries, None));
    body.push_str(
        r#"<p><a href="/reset-db" onclick="return confirm('Delete every photo and name?')">Reset archive</a></p>"#,
    );
    layout("Gallery", &body)
}

pub fn render_search(outcome: &SearchOutcome) -> String {
    let filter = &outcome.filter;
    let value = |v: &Option<String>| v.as_deref().map(escape).unwrap_or_default();

    let mut body = format!(
        r#"<form method="post" action="/search">
<label>Person <input type="text" name="person_name" value="{}"></label>
<label>Date <input type="date" name="date_taken" value="{}"></label>
<label>Place <input type="text" name="place_taken" value="{}"></label>
<button type="submit">Search</button>
</form>"#,
        value(&filter.person_name),
        value(&filter.date_taken),
        value(&filter.place_taken),
    );

    if filter.is_empty() {
        body.push_str(&format!("<p>All {} photo(s).</p>", outcome.results.len()));
    } else {
        body.push_str(&format!("<p>{} photo(s) found.</p>", outcome.results.len()));
    }
    body.push_str(&summary_table(&outcome.results, outcome.highlight_person_id));
    layout("Search", &body)
}

pub fn render_error(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        r#"<p class="error">{}</p><p><a href="/">Back to upload</a></p>"#,
        escape(message)
    );
    layout(title, &body)
}
