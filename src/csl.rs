//! Projection of records into CSL-JSON.
//!
//! Maps the source's field, creator-role and publication-type taxonomies
//! onto the CSL ones. Records whose type has no CSL equivalent project to
//! an empty document; they stay in the index but cannot be cited.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::models::{Creator, Record};
use crate::normalize;

/// CSL fields carrying dates, emitted as `date-parts`.
const CSL_DATE_KEYS: [&str; 5] = [
    "issued",
    "accessed",
    "event-date",
    "original-date",
    "submitted",
];

/// Canonical source field/role name for an alias.
///
/// The source spells the same concept differently per entry type
/// ("blogTitle", "bookTitle", ... are all the container title); citation
/// mapping works on the canonical spelling.
fn remap(name: &str) -> &str {
    match name {
        "artist" => "author",
        "artworkMedium" => "medium",
        "audioFileType" => "medium",
        "audioRecordingFormat" => "medium",
        "billNumber" => "number",
        "blogTitle" => "publicationTitle",
        "bookTitle" => "publicationTitle",
        "cartographer" => "author",
        "caseName" => "title",
        "codePages" => "pages",
        "codeVolume" => "volume",
        "company" => "publisher",
        "contributor" => "author",
        "dateDecided" => "date",
        "dateEnacted" => "date",
        "dictionaryTitle" => "publicationTitle",
        "director" => "author",
        "distributor" => "publisher",
        "docketNumber" => "number",
        "documentNumber" => "number",
        "encyclopediaTitle" => "publicationTitle",
        "episodeNumber" => "number",
        "firstPage" => "pages",
        "forumTitle" => "publicationTitle",
        "genre" => "type",
        "institution" => "publisher",
        "interviewMedium" => "medium",
        "interviewee" => "author",
        "inventor" => "author",
        "issueDate" => "date",
        "label" => "publisher",
        "letterType" => "type",
        "manuscriptType" => "type",
        "mapType" => "type",
        "nameOfAct" => "title",
        "network" => "publisher",
        "patentNumber" => "number",
        "performer" => "author",
        "podcaster" => "author",
        "postType" => "type",
        "presentationType" => "type",
        "presenter" => "author",
        "proceedingsTitle" => "publicationTitle",
        "programTitle" => "publicationTitle",
        "programmer" => "author",
        "publicLawNumber" => "number",
        "reportNumber" => "number",
        "reportType" => "type",
        "reporterVolume" => "volume",
        "sponsor" => "author",
        "studio" => "publisher",
        "subject" => "title",
        "thesisType" => "type",
        "university" => "publisher",
        "videoRecordingFormat" => "medium",
        "websiteTitle" => "publicationTitle",
        "websiteType" => "type",
        other => other,
    }
}

/// CSL field name for a source data field, or `None` if it has no CSL
/// equivalent. Type-specific mappings take precedence.
fn map_field(zfield: &str, ztype: &str) -> Option<&'static str> {
    let zfield = remap(zfield);

    // Type-specific mapping first.
    if let ("conferencePaper", "place") = (ztype, zfield) {
        return Some("event-place");
    }

    match zfield {
        "DOI" => Some("DOI"),
        "ISBN" => Some("ISBN"),
        "ISSN" => Some("ISSN"),
        "abstractNote" => Some("abstract"),
        "accessDate" => Some("accessed"),
        "applicationNumber" => Some("call-number"),
        "archive" => Some("archive"),
        "archiveLocation" => Some("archive_location"),
        "artworkSize" => Some("dimensions"),
        "callNumber" => Some("call-number"),
        "code" => Some("container-title"),
        "codeNumber" => Some("volume"),
        "committee" => Some("section"),
        "conferenceName" => Some("event"),
        "court" => Some("authority"),
        "date" => Some("issued"),
        "edition" => Some("edition"),
        "extra" => Some("note"),
        "filingDate" => Some("submitted"),
        "history" => Some("references"),
        "issue" => Some("issue"),
        "issuingAuthority" => Some("authority"),
        "journalAbbreviation" => Some("journalAbbreviation"),
        "language" => Some("language"),
        "legalStatus" => Some("status"),
        "legislativeBody" => Some("authority"),
        "libraryCatalog" => Some("source"),
        "medium" => Some("medium"),
        "meetingName" => Some("event"),
        "numPages" => Some("number-of-pages"),
        "number" => Some("number"),
        "numberOfVolumes" => Some("number-of-volumes"),
        "pages" => Some("page"),
        "place" => Some("publisher-place"),
        "priorityNumbers" => Some("issue"),
        "programmingLanguage" => Some("genre"),
        "publicationTitle" => Some("container-title"),
        "publisher" => Some("publisher"),
        "references" => Some("references"),
        "reporter" => Some("container-title"),
        "runningTime" => Some("dimensions"),
        "scale" => Some("scale"),
        "section" => Some("section"),
        "series" => Some("collection-title"),
        "seriesNumber" => Some("collection-number"),
        "seriesTitle" => Some("collection-title"),
        "session" => Some("chapter-number"),
        "shortTitle" => Some("shortTitle"),
        "system" => Some("medium"),
        "title" => Some("title"),
        "type" => Some("genre"),
        "url" => Some("URL"),
        "version" => Some("version"),
        "volume" => Some("volume"),
        _ => None,
    }
}

/// CSL creator role for a source creator role, or `None`.
fn map_creator(ztype: &str) -> Option<&'static str> {
    match remap(ztype) {
        "author" => Some("author"),
        "bookAuthor" => Some("container-author"),
        "composer" => Some("composer"),
        "director" => Some("director"),
        "editor" => Some("editor"),
        "interviewer" => Some("interviewer"),
        "recipient" => Some("recipient"),
        "reviewedAuthor" => Some("reviewed-author"),
        "seriesEditor" => Some("collection-editor"),
        "translator" => Some("translator"),
        _ => None,
    }
}

/// CSL publication type for a source entry type, or `None`.
fn map_type(ztype: &str) -> Option<&'static str> {
    match remap(ztype) {
        "artwork" => Some("graphic"),
        "attachment" => Some("article"),
        "audioRecording" => Some("song"),
        "bill" => Some("bill"),
        "blogPost" => Some("post-weblog"),
        "book" => Some("book"),
        "bookSection" => Some("chapter"),
        "case" => Some("legal_case"),
        "computerProgram" => Some("book"),
        "conferencePaper" => Some("paper-conference"),
        "dictionaryEntry" => Some("entry-dictionary"),
        "document" => Some("article"),
        "email" => Some("personal_communication"),
        "encyclopediaArticle" => Some("entry-encyclopedia"),
        "film" => Some("motion_picture"),
        "forumPost" => Some("post"),
        "hearing" => Some("bill"),
        "instantMessage" => Some("personal_communication"),
        "interview" => Some("interview"),
        "journalArticle" => Some("article-journal"),
        "letter" => Some("personal_communication"),
        "magazineArticle" => Some("article-magazine"),
        "manuscript" => Some("manuscript"),
        "map" => Some("map"),
        "newspaperArticle" => Some("article-newspaper"),
        "note" => Some("article"),
        "patent" => Some("patent"),
        "podcast" => Some("song"),
        "presentation" => Some("speech"),
        "radioBroadcast" => Some("broadcast"),
        "report" => Some("report"),
        "statute" => Some("legislation"),
        "thesis" => Some("thesis"),
        "tvBroadcast" => Some("broadcast"),
        "videoRecording" => Some("motion_picture"),
        "webpage" => Some("webpage"),
        _ => None,
    }
}

/// Convert one creator. `None` if the creator is nameless or its role has
/// no CSL equivalent.
fn convert_creator(creator: &Creator) -> Option<(Value, &'static str)> {
    let family = creator.family.as_deref().filter(|f| !f.is_empty())?;
    let role = map_creator(&creator.kind)?;

    let mut name = Map::new();
    name.insert("family".into(), json!(family));
    if let Some(given) = creator.given.as_deref().filter(|g| !g.is_empty()) {
        name.insert("given".into(), json!(given));
    }
    Some((Value::Object(name), role))
}

/// `date-parts` for a raw date string, as far as it parses.
fn date_parts(datestr: &str) -> Option<Value> {
    normalize::parse_date(datestr).map(|d| json!({ "date-parts": [d.parts()] }))
}

/// CSL-JSON document for a record.
///
/// An empty object when the record's type has no CSL mapping; the record
/// then renders nowhere but remains searchable.
pub fn entry_data(record: &Record) -> Value {
    let Some(ctype) = map_type(&record.kind) else {
        warn!(id = record.id, kind = %record.kind, "no CSL mapping for type");
        return Value::Object(Map::new());
    };

    let mut data = Map::new();
    data.insert("id".into(), json!(record.key));
    data.insert("type".into(), json!(ctype));

    let mut creators: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
    for creator in &record.creators {
        match convert_creator(creator) {
            Some((name, role)) => creators.entry(role).or_default().push(name),
            None => warn!(id = record.id, role = %creator.kind, "skipping unmappable creator"),
        }
    }
    for (role, names) in creators {
        data.insert(role.into(), Value::Array(names));
    }

    for (zfield, value) in &record.zdata {
        let Some(cfield) = map_field(zfield, &record.kind) else {
            continue;
        };
        if CSL_DATE_KEYS.contains(&cfield) {
            match date_parts(value) {
                Some(parts) => {
                    data.insert(cfield.into(), parts);
                }
                None => debug!(id = record.id, field = %zfield, "unparseable date"),
            }
        } else {
            data.insert(cfield.into(), json!(value));
        }
    }

    Value::Object(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: &str) -> Record {
        Record {
            id: 1,
            key: "CSLKEY01".into(),
            library: 1,
            kind: kind.into(),
            title: String::new(),
            date: None,
            year: 0,
            abstract_: String::new(),
            modified: chrono::NaiveDate::from_ymd_opt(2022, 2, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            zdata: BTreeMap::new(),
            creators: Vec::new(),
            collections: Vec::new(),
            attachments: Vec::new(),
            notes: Vec::new(),
            tags: Vec::new(),
            csl: json!({}),
        }
    }

    #[test]
    fn blog_post_becomes_post_weblog() {
        let data = entry_data(&record("blogPost"));
        assert_eq!(data["type"], "post-weblog");
        assert_eq!(data["id"], "CSLKEY01");
    }

    #[test]
    fn unknown_type_projects_to_empty() {
        let data = entry_data(&record("syllabus"));
        assert_eq!(data, json!({}));
    }

    #[test]
    fn artist_is_an_author_synonym() {
        let mut r = record("artwork");
        r.creators.push(Creator {
            family: Some("Hokusai".into()),
            given: None,
            kind: "artist".into(),
            index: 0,
        });
        let data = entry_data(&r);
        assert_eq!(data["author"], json!([{ "family": "Hokusai" }]));
    }

    #[test]
    fn nameless_creator_is_omitted() {
        let mut r = record("book");
        r.creators.push(Creator {
            family: None,
            given: Some("Prince".into()),
            kind: "author".into(),
            index: 0,
        });
        let data = entry_data(&r);
        assert!(data.get("author").is_none());
    }

    #[test]
    fn date_field_becomes_date_parts() {
        let mut r = record("journalArticle");
        r.zdata
            .insert("date".into(), "2019-03-15 March 15, 2019".into());
        let data = entry_data(&r);
        assert_eq!(data["issued"], json!({ "date-parts": [[2019, 3, 15]] }));
    }

    #[test]
    fn container_title_aliases_collapse() {
        let mut r = record("bookSection");
        r.zdata.insert("bookTitle".into(), "The Big Book".into());
        let data = entry_data(&r);
        assert_eq!(data["container-title"], "The Big Book");
    }

    #[test]
    fn conference_place_is_event_place() {
        let mut r = record("conferencePaper");
        r.zdata.insert("place".into(), "Lisbon".into());
        let data = entry_data(&r);
        assert_eq!(data["event-place"], "Lisbon");

        let mut r = record("book");
        r.zdata.insert("place".into(), "Lisbon".into());
        let data = entry_data(&r);
        assert_eq!(data["publisher-place"], "Lisbon");
    }
}
