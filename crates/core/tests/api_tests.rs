//! Library API integration tests
use clipmark_core::*;
use time::macros::date;

const ARTICLE_URL: &str = "https://example.com/blog/cats.html";

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn article_document() -> Document {
    let html = std::fs::read_to_string(get_fixture_path("article.html")).unwrap();
    Document::parse_with_url(&html, ARTICLE_URL).expect("should parse")
}

fn fixed_metadata(doc: &Document) -> PageMetadata {
    PageMetadata { saved_on: date!(2024 - 05 - 01), ..doc.extract_page_metadata() }
}

fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn test_convert_article_structure() {
    let doc = article_document();
    let settings = ConversionSettings::builder().add_frontmatter(false).build();
    let result = convert(&doc, &fixed_metadata(&doc), &settings);
    let md = &result.markdown;

    assert!(md.starts_with("# Caring for Cats\n\nSource: [https://example.com/blog/cats.html](https://example.com/blog/cats.html)\n\n"));
    assert!(md.contains("## Feeding\n\n1. Fresh water every day\n2. Measured portions\n\n"));
    assert!(md.contains("- Brush **weekly**\n- Trim claws\n\n"));
    assert!(md.contains("> A cat is a lion in a jungle of small bushes.\n\n"));
    assert!(md.contains("| Age | Meals per day |\n| --- | --- |\n| Kitten | 4 |\n| Adult | 2 |\n"));
    assert!(md.contains("```\nfeed(cat, portion=50)\n```\n\n"));
    assert!(md.contains("[the cat guide](https://example.org/cats)"));
    assert!(md.contains("![Sleeping cat](images/cat.png)\n\n"));
    assert!(!md.contains("tracking"));
    assert!(!md.contains("color: red"));
}

#[test]
fn test_convert_article_images() {
    let doc = article_document();
    let result = convert(&doc, &fixed_metadata(&doc), &ConversionSettings::default());

    let images: Vec<(&str, &str)> =
        result.images.iter().map(|i| (i.source_url.as_str(), i.filename.as_str())).collect();
    assert_eq!(
        images,
        [
            ("https://example.com/blog/media/cat.png?size=large", "cat.png"),
            ("https://example.com/blog/media/kitten.webp", "kitten.webp"),
            ("https://example.com/blog/media/hero.jpg", "hero.jpg"),
        ]
    );

    assert!(result.markdown.ends_with(
        "\n## Additional Images\n\n![Kitten](images/kitten.webp)\n\n![Background Image](images/hero.jpg)\n\n"
    ));
}

#[test]
fn test_every_image_appears_exactly_once() {
    let doc = article_document();
    let result = convert(&doc, &fixed_metadata(&doc), &ConversionSettings::default());

    for image in &result.images {
        let path = format!("(images/{})", image.filename);
        assert_eq!(occurrences(&result.markdown, &path), 1, "{} should appear once", path);
    }
}

#[test]
fn test_filenames_are_safe() {
    let html = r#"<body>
        <img src="https://x/weird name (1).PNG">
        <img src="https://x/no-extension">
        <img src="https://x/">
        <img src="https://x/emoji-%F0%9F%90%88.gif?x=1#y">
        <div style="background: url(https://x/b%20g)"></div>
    </body>"#;
    let result = convert_html(html, None, &ConversionSettings::default()).unwrap();
    let safe = regex::Regex::new(r"^[A-Za-z0-9._-]+\.[A-Za-z0-9]+$").unwrap();

    assert_eq!(result.images.len(), 5);
    for image in &result.images {
        assert!(safe.is_match(&image.filename), "unsafe filename {}", image.filename);
    }
}

#[test]
fn test_conversion_is_deterministic() {
    let doc = article_document();
    let page = fixed_metadata(&doc);
    let settings = ConversionSettings::default();

    assert_eq!(convert(&doc, &page, &settings), convert(&doc, &page, &settings));
}

#[test]
fn test_frontmatter_from_page_metadata() {
    let doc = article_document();
    let settings = ConversionSettings::builder().tags(["cats", "pets"]).build();
    let result = convert(&doc, &fixed_metadata(&doc), &settings);

    assert!(result.markdown.starts_with(
        "---\n\
         title: Caring for Cats\n\
         description: A short guide feeding, grooming tips\n\
         tags:\n  - cats\n  - pets\n\
         published: true\n\
         date: 2024-05-01\n\
         ---\n\n\
         Source: "
    ));
}

#[test]
fn test_simple_document_scenario() {
    let doc = Document::parse("<html><head><title>Title</title></head><body><h1>Title</h1><p>Hello <b>world</b></p></body></html>")
        .unwrap();
    let page = PageMetadata { url: Some("https://x/".to_string()), ..fixed_metadata(&doc) };
    let result = convert(&doc, &page, &ConversionSettings::builder().add_frontmatter(false).build());

    assert_eq!(
        result.markdown,
        "# Title\n\nSource: [https://x/](https://x/)\n\n# Title\n\nHello **world**\n\n"
    );
}

#[test]
fn test_single_image_scenario() {
    let result = convert_html(
        r#"<p><img src="https://x/a.png?v=2" alt="Cat"></p>"#,
        None,
        &ConversionSettings::default(),
    )
    .unwrap();

    assert_eq!(
        result.images,
        vec![ImageEntry { source_url: "https://x/a.png?v=2".to_string(), filename: "a.png".to_string() }]
    );
    assert!(result.markdown.contains("![Cat](images/a.png)"));
    assert!(!result.markdown.contains(ADDITIONAL_IMAGES_HEADING));
}

#[test]
fn test_duplicate_sources_collapse() {
    let result = convert_html(
        r#"<img src="https://x/a.png"><img src="https://x/a.png">"#,
        None,
        &ConversionSettings::default(),
    )
    .unwrap();
    assert_eq!(result.images.len(), 1);
}

#[test]
fn test_hidden_custom_element_image_is_appended() {
    let result = convert_html(
        r#"<body><p>Intro</p><x-carousel hidden><span><img src="https://x/slide.jpg"></span></x-carousel></body>"#,
        None,
        &ConversionSettings::default(),
    )
    .unwrap();

    assert!(result.markdown.ends_with("## Additional Images\n\n![image](images/slide.jpg)\n\n"));
}

#[test]
fn test_snapshot_from_browser_host() {
    let snapshot = r#"{
        "root": {
            "tag": "html",
            "children": [
                {"element": {"tag": "head", "layout": {"hidden": true}, "children": [
                    {"element": {"tag": "title", "children": [{"text": "Snap"}]}}
                ]}},
                {"element": {"tag": "body", "children": [
                    {"element": {"tag": "p", "children": [{"text": "From the browser"}]}},
                    {"element": {"tag": "img", "attributes": {"src": "/icon.png"}, "layout": {"width": 8, "height": 8}}},
                    {"element": {"tag": "div", "layout": {"background_image": "url(\"/bg.png\")"}}}
                ]}}
            ]
        },
        "url": "https://snap.example/page"
    }"#;

    let doc = Document::from_snapshot(snapshot).unwrap();
    let page = fixed_metadata(&doc);
    assert_eq!(page.title, "Snap");

    let result = convert(&doc, &page, &ConversionSettings::builder().add_frontmatter(false).build());
    assert!(result.markdown.contains("From the browser\n\n"));
    assert_eq!(result.images.len(), 1);
    assert_eq!(result.images[0].source_url, "https://snap.example/bg.png");
}

#[test]
fn test_edge_case_empty() {
    let html = std::fs::read_to_string(get_fixture_path("empty_content.html")).unwrap();
    let result = convert_html(&html, None, &ConversionSettings::builder().add_frontmatter(false).build()).unwrap();

    assert_eq!(result.markdown, "# Untitled\n\n");
    assert!(result.images.is_empty());
}

#[test]
fn test_deeply_nested_document_converts() {
    let html = format!(
        "<body>{}<p>Bottom</p>{}</body>",
        "<div>".repeat(5_000),
        "</div>".repeat(5_000)
    );
    let result = convert_html(&html, None, &ConversionSettings::builder().add_frontmatter(false).build()).unwrap();
    assert!(result.markdown.contains("Bottom"));
}
