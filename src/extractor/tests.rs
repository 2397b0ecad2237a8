use super::*;
use tempfile::TempDir;

#[test]
fn doc_type_detection_from_extension() {
    assert_eq!(DocType::from_path(Path::new("a.txt")), Some(DocType::Text));
    assert_eq!(DocType::from_path(Path::new("a.md")), Some(DocType::Text));
    assert_eq!(DocType::from_path(Path::new("A.TXT")), Some(DocType::Text));
    assert_eq!(DocType::from_path(Path::new("a.pdf")), Some(DocType::Pdf));
    assert_eq!(DocType::from_path(Path::new("a.json")), Some(DocType::Json));
    assert_eq!(DocType::from_path(Path::new("a.html")), Some(DocType::Html));
    assert_eq!(DocType::from_path(Path::new("a.htm")), Some(DocType::Html));
    assert_eq!(DocType::from_path(Path::new("a.rs")), None);
    assert_eq!(DocType::from_path(Path::new("noext")), None);
}

#[test]
fn doc_type_round_trips_through_strings() {
    for doc_type in [DocType::Text, DocType::Pdf, DocType::Json, DocType::Html] {
        assert_eq!(
            doc_type.as_str().parse::<DocType>().expect("parses"),
            doc_type
        );
    }
    assert!("word".parse::<DocType>().is_err());
}

#[test]
fn json_is_validated_and_pretty_printed() {
    let text = extract_json(r#"{"name":"checkout","steps":["cart","pay"]}"#)
        .expect("extraction succeeds");

    assert!(text.contains("\"name\": \"checkout\""));
    assert!(text.lines().count() > 1);
}

#[test]
fn invalid_json_is_an_extraction_error() {
    let result = extract_json("{ not json");
    assert!(matches!(result, Err(QagenError::Extraction(_))));
}

#[test]
fn html_text_is_whitespace_normalized() {
    let html = "<html><body><h1>Login</h1>\n  <p>Enter   your\n password.</p></body></html>";
    let (text, _) = extract_html(html);

    assert_eq!(text, "Login Enter your password.");
}

#[test]
fn html_selectors_are_collected() {
    let html = r#"<html><body>
        <form>
            <input type="text" id="username" name="user">
            <input type="password" id="password" name="pass">
            <button id="submit" class="btn primary">Sign in</button>
        </form>
    </body></html>"#;

    let (_, selectors) = extract_html(html);

    assert_eq!(selectors.ids.len(), 3);
    assert_eq!(selectors.ids[0].tag, "input");
    assert_eq!(selectors.ids[0].value, "username");
    assert_eq!(selectors.ids[0].input_type, "text");

    assert_eq!(selectors.names.len(), 2);
    assert_eq!(selectors.names[1].value, "pass");
    assert_eq!(selectors.names[1].input_type, "password");

    assert_eq!(selectors.classes.len(), 1);
    assert_eq!(selectors.classes[0].tag, "button");
    assert_eq!(selectors.classes[0].value, "btn primary");
}

#[test]
fn selectors_absent_for_plain_markup() {
    let (_, selectors) = extract_html("<p>no addressable elements</p>");
    assert!(selectors.is_empty());
}

#[test]
fn extract_file_reads_text_documents() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("notes.md");
    std::fs::write(&path, "# Heading\n\nBody text.").expect("write succeeds");

    let document = extract_file(&path).expect("extraction succeeds");

    assert_eq!(document.filename, "notes.md");
    assert_eq!(document.doc_type, DocType::Text);
    assert_eq!(document.text, "# Heading\n\nBody text.");
    assert!(document.selectors.is_none());
}

#[test]
fn extract_file_populates_html_selectors() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("page.html");
    std::fs::write(&path, "<body><input id=\"q\" type=\"search\"></body>").expect("write succeeds");

    let document = extract_file(&path).expect("extraction succeeds");

    assert_eq!(document.doc_type, DocType::Html);
    let selectors = document.selectors.expect("selectors present");
    assert_eq!(selectors.ids[0].value, "q");
}

#[test]
fn pdf_files_are_rejected_with_guidance() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("spec.pdf");
    std::fs::write(&path, b"%PDF-1.4").expect("write succeeds");

    let result = extract_file(&path);
    match result {
        Err(QagenError::Extraction(message)) => assert!(message.contains("external converter")),
        other => panic!("expected extraction error, got {other:?}"),
    }
}

#[test]
fn unsupported_extensions_are_rejected() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("binary.exe");
    std::fs::write(&path, b"MZ").expect("write succeeds");

    assert!(matches!(
        extract_file(&path),
        Err(QagenError::Extraction(_))
    ));
}
