use serde::Serialize;
use std::collections::BTreeMap;

use super::{upload_url, Archive, FaceView};
use crate::db::{Database, ImageRecord, Person, SearchFilter};
use crate::error::{ArchiveError, ArchiveResult};

/// One row of the gallery or of a search result
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub image: ImageRecord,
    pub image_url: String,
    pub face_count: i64,
    pub people: Vec<String>,
}

/// Everything shown on an image's result page
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetail {
    pub image: ImageRecord,
    pub image_url: String,
    pub faces: Vec<FaceView>,
    /// Face id to its person names joined with ", "
    pub names_by_face: BTreeMap<i64, String>,
    pub highlight_person: Option<Person>,
    pub highlight_face_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub filter: SearchFilter,
    pub results: Vec<ImageSummary>,
    /// Set when the name filter matched exactly one person
    pub highlight_person_id: Option<i64>,
}

fn summarize(db: &Database, images: Vec<ImageRecord>) -> ArchiveResult<Vec<ImageSummary>> {
    images
        .into_iter()
        .map(|image| {
            Ok(ImageSummary {
                face_count: db.count_faces_for_image(&image.id)?,
                people: db.people_names_for_image(&image.id)?,
                image_url: upload_url(&image.filename),
                image,
            })
        })
        .collect()
}

impl Archive {
    /// All images, newest upload first
    pub fn gallery(&self) -> ArchiveResult<Vec<ImageSummary>> {
        let db = self.db()?;
        let images = db.list_images()?;
        summarize(&db, images)
    }

    pub fn image_detail(
        &self,
        image_id: &str,
        highlight_person_id: Option<i64>,
    ) -> ArchiveResult<ImageDetail> {
        let db = self.db()?;
        let image = db
            .get_image(image_id)?
            .ok_or_else(|| ArchiveError::NotFound(format!("image {}", image_id)))?;

        let faces = db.get_faces_for_image(image_id)?;
        let names_by_face = db
            .names_by_face(image_id)?
            .into_iter()
            .map(|(face_id, names)| (face_id, names.join(", ")))
            .collect();

        let (highlight_person, highlight_face_ids) = match highlight_person_id {
            Some(person_id) => (
                db.get_person(person_id)?,
                db.face_ids_for_person(image_id, person_id)?,
            ),
            None => (None, Vec::new()),
        };

        Ok(ImageDetail {
            image_url: upload_url(&image.filename),
            image,
            faces: faces.iter().map(FaceView::from).collect(),
            names_by_face,
            highlight_person,
            highlight_face_ids,
        })
    }

    /// Search by person name, exact date and place.
    ///
    /// A name filter only narrows the candidates when it matches at least
    /// one person; otherwise the date and place filters apply to every image.
    pub fn search(&self, filter: SearchFilter) -> ArchiveResult<SearchOutcome> {
        let db = self.db()?;
        let mut images = db.images_matching(&filter)?;
        let mut highlight_person_id = None;

        if let Some(name) = &filter.person_name {
            let people = db.find_people_matching(name)?;
            if let [only] = people.as_slice() {
                highlight_person_id = Some(only.id);
            }

            if !people.is_empty() {
                let ids: Vec<i64> = people.iter().map(|p| p.id).collect();
                let with_people = db.image_ids_with_people(&ids)?;
                images.retain(|image| with_people.contains(&image.id));
            }
        }

        let results = summarize(&db, images)?;
        tracing::debug!(?filter, results = results.len(), "Search finished");

        Ok(SearchOutcome {
            filter,
            results,
            highlight_person_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::super::test_support::*;
    use super::*;

    fn ids(summaries: &[ImageSummary]) -> Vec<String> {
        summaries.iter().map(|s| s.image.id.clone()).collect()
    }

    fn tag(archive: &Archive, image_id: &str, face_id: i64, names: &str) {
        let form: HashMap<String, String> = [(face_id.to_string(), names.to_string())].into();
        archive.tag_faces(image_id, &form).unwrap();
    }

    #[test]
    fn test_gallery_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![bbox(0, 0, 10, 10)]);
        let first = archive.upload(upload("a.png", None, None)).unwrap();
        let second = archive.upload(upload("b.png", None, None)).unwrap();
        tag(&archive, &first.image.id, first.faces[0].id, "Zoe, Adam, Zoe");

        let gallery = archive.gallery().unwrap();
        assert_eq!(ids(&gallery), vec![second.image.id.clone(), first.image.id.clone()]);
        assert_eq!(gallery[1].face_count, 1);
        assert_eq!(gallery[1].people, vec!["Adam", "Zoe"]);
        assert!(gallery[0].people.is_empty());
    }

    #[test]
    fn test_search_without_filters_matches_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![]);
        for name in ["a.png", "b.png", "c.png"] {
            archive.upload(upload(name, None, None)).unwrap();
        }

        let outcome = archive.search(SearchFilter::default()).unwrap();
        assert_eq!(ids(&outcome.results), ids(&archive.gallery().unwrap()));
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.highlight_person_id, None);
    }

    #[test]
    fn test_search_place_without_match_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![]);
        archive.upload(upload("a.png", Some("Oslo"), None)).unwrap();

        let filter = SearchFilter::from_form(None, None, Some("Tromsø"));
        assert!(archive.search(filter).unwrap().results.is_empty());

        let filter = SearchFilter::from_form(None, None, Some("osl"));
        assert_eq!(archive.search(filter).unwrap().results.len(), 1);
    }

    #[test]
    fn test_search_by_person_and_highlight_hint() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![bbox(0, 0, 10, 10)]);
        let a = archive.upload(upload("a.png", None, Some("2023-07-14"))).unwrap();
        let b = archive.upload(upload("b.png", None, Some("2023-07-15"))).unwrap();
        let c = archive.upload(upload("c.png", None, None)).unwrap();
        tag(&archive, &a.image.id, a.faces[0].id, "Alice Hansen");
        tag(&archive, &b.image.id, b.faces[0].id, "Alina");
        tag(&archive, &c.image.id, c.faces[0].id, "Bob");

        let outcome = archive.search(SearchFilter::from_form(Some("hansen"), None, None)).unwrap();
        assert_eq!(ids(&outcome.results), vec![a.image.id.clone()]);
        let alice = archive.db().unwrap().find_person_by_name("Alice Hansen").unwrap().unwrap();
        assert_eq!(outcome.highlight_person_id, Some(alice.id));

        let outcome = archive.search(SearchFilter::from_form(Some("ALI"), None, None)).unwrap();
        assert_eq!(ids(&outcome.results), vec![b.image.id.clone(), a.image.id.clone()]);
        assert_eq!(outcome.highlight_person_id, None);

        let outcome = archive
            .search(SearchFilter::from_form(Some("ali"), Some("2023-07-15"), None))
            .unwrap();
        assert_eq!(ids(&outcome.results), vec![b.image.id.clone()]);

        let outcome = archive.search(SearchFilter::from_form(Some("nobody"), None, None)).unwrap();
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.highlight_person_id, None);
    }

    #[test]
    fn test_unmatched_name_still_filters_by_place() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![bbox(0, 0, 10, 10)]);
        let oslo = archive.upload(upload("a.png", Some("Oslo"), None)).unwrap();
        let bergen = archive.upload(upload("b.png", Some("Bergen"), None)).unwrap();
        tag(&archive, &bergen.image.id, bergen.faces[0].id, "Alice");

        let outcome = archive
            .search(SearchFilter::from_form(Some("nobody"), None, Some("Oslo")))
            .unwrap();
        assert_eq!(ids(&outcome.results), vec![oslo.image.id.clone()]);
        assert_eq!(outcome.highlight_person_id, None);
    }

    #[test]
    fn test_image_detail_with_highlight() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![bbox(0, 0, 10, 10), bbox(20, 20, 10, 10)]);
        let outcome = archive.upload(upload("a.png", Some("Bergen"), None)).unwrap();
        let image_id = &outcome.image.id;
        let (first, second) = (outcome.faces[0].id, outcome.faces[1].id);

        let form: HashMap<String, String> = [
            (first.to_string(), "Bob, Alice".to_string()),
            (second.to_string(), "Alice".to_string()),
        ]
        .into();
        archive.tag_faces(image_id, &form).unwrap();
        let bob = archive.db().unwrap().find_person_by_name("Bob").unwrap().unwrap();

        let detail = archive.image_detail(image_id, Some(bob.id)).unwrap();
        assert_eq!(detail.image.place_taken.as_deref(), Some("Bergen"));
        assert_eq!(detail.faces.len(), 2);
        assert_eq!(detail.names_by_face[&first], "Alice, Bob");
        assert_eq!(detail.names_by_face[&second], "Alice");
        assert_eq!(detail.highlight_face_ids, vec![first]);
        assert_eq!(detail.highlight_person.map(|p| p.name).as_deref(), Some("Bob"));

        let plain = archive.image_detail(image_id, None).unwrap();
        assert!(plain.highlight_face_ids.is_empty());
        assert!(plain.highlight_person.is_none());
    }

    #[test]
    fn test_detail_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![bbox(4, 6, 10, 12)]);
        let outcome = archive.upload(upload("a.png", None, Some("2022-01-09"))).unwrap();
        let face_id = outcome.faces[0].id;
        tag(&archive, &outcome.image.id, face_id, "Kari");

        let detail = archive.image_detail(&outcome.image.id, None).unwrap();
        let json = serde_json::to_value(&detail).unwrap();

        assert_eq!(json["image"]["date_taken"], "2022-01-09");
        assert_eq!(json["faces"][0]["bbox"]["x"], 4);
        assert_eq!(json["faces"][0]["bbox"]["height"], 12);
        assert_eq!(json["names_by_face"][face_id.to_string()], "Kari");
        assert!(json["highlight_person"].is_null());
    }

    #[test]
    fn test_image_detail_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_detecting(dir.path(), vec![]);
        assert!(matches!(archive.image_detail("missing", None), Err(ArchiveError::NotFound(_))));
    }
}
