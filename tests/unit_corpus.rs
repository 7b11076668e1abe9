// Unit tests for the corpus reader, reading real files from a temp dir.

use std::io::Write;

use textlens::corpus;

fn corpus_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const BULK_SAMPLE: &str = r#"{"index":{"_index":"shakespeare","_id":0}}
{"type":"act","line_id":1,"play_name":"Henry IV","speech_number":"","line_number":"","speaker":"","text_entry":"ACT I"}
{"index":{"_index":"shakespeare","_id":1}}
{"type":"scene","line_id":2,"play_name":"Henry IV","speech_number":"","line_number":"","speaker":"","text_entry":"SCENE I. London. The palace."}
{"index":{"_index":"shakespeare","_id":2}}
{"type":"line","line_id":4,"play_name":"Henry IV","speech_number":1,"line_number":"1.1.1","speaker":"KING HENRY IV","text_entry":"So shaken as we are, so wan with care,"}
"#;

#[test]
fn reads_bulk_shaped_corpus() {
    let file = corpus_file(BULK_SAMPLE);
    let records: Vec<_> = corpus::open(file.path()).unwrap().collect();

    assert_eq!(records.len(), 3);
    let docs: Vec<_> = records.into_iter().map(Result::unwrap).collect();
    assert_eq!(
        docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
        vec!["0", "1", "2"]
    );
    assert_eq!(docs[2].field("speaker"), Some("KING HENRY IV"));
    assert_eq!(docs[2].field("speech_number"), Some("1"));
    assert_eq!(docs[2].field("text_entry"), Some("So shaken as we are, so wan with care,"));
}

#[test]
fn malformed_lines_do_not_stop_the_read() {
    let file = corpus_file(
        "{\"text_entry\":\"first\"}\n{broken\n{\"text_entry\":[\"a\",\"b\"]}\n{\"text_entry\":\"last\"}\n",
    );
    let records: Vec<_> = corpus::open(file.path()).unwrap().collect();

    assert_eq!(records.len(), 4);
    assert!(records[0].is_ok());
    assert_eq!(records[1].as_ref().unwrap_err().locator, "line 2");
    assert_eq!(records[2].as_ref().unwrap_err().locator, "line 3");
    assert_eq!(records[3].as_ref().unwrap().id, "4");
}

#[test]
fn trailing_action_line_is_reported() {
    let file = corpus_file("{\"index\":{\"_id\":\"9\"}}\n{\"text_entry\":\"x\"}\n{\"index\":{\"_id\":\"10\"}}\n\n");
    let records: Vec<_> = corpus::open(file.path()).unwrap().collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].as_ref().unwrap().id, "9");
    let failure = records[1].as_ref().unwrap_err();
    assert_eq!(failure.locator, "line 3");
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = corpus::open(&dir.path().join("absent.json")).err().unwrap();
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn invalid_utf8_line_is_skipped_as_malformed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{\"text_entry\":\"ok\"}\n\xff\xfe\n{\"text_entry\":\"also ok\"}\n")
        .unwrap();
    file.flush().unwrap();

    let records: Vec<_> = corpus::open(file.path()).unwrap().collect();
    assert_eq!(records.len(), 3);
    assert!(records[0].is_ok());
    assert!(records[1].is_err());
    assert!(records[2].is_ok());
}
