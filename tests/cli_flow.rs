mod common;

use certificado::pdf::page_text;
use certificado::{CertificateRenderer, CertificateRequest, DocumentConverter};
use common::{payload, TestContext};
use predicates::prelude::*;

fn page_text_of(bytes: &[u8]) -> String {
    page_text(bytes).expect("output should be a readable PDF").join("\n")
}

#[test]
fn payload_call_writes_pdf_to_stdout() {
    let ctx = TestContext::new();
    let json = r#"{"student_name":"Maria Souza","course_name":"Formação Herbalista Pro","completion_date":"15/03/2024"}"#;

    let assert = ctx.cli().arg(payload(json)).assert().success().stderr(predicate::str::is_empty());
    let stdout = &assert.get_output().stdout;

    assert!(stdout.starts_with(b"%PDF-"));
    let text = page_text_of(stdout);
    assert!(text.contains("Maria Souza"));
    assert!(text.contains("Formação Herbalista Pro"));
    assert!(text.contains("15/03/2024"));
}

#[test]
fn stdout_bytes_match_direct_conversion() {
    let ctx = TestContext::new();
    let request = CertificateRequest::new(
        "João Pereira".to_string(),
        "Aromaterapia".to_string(),
        "01/12/2024".to_string(),
    );
    let encoded = certificado::cli::encode_payload(&request).unwrap();

    let assert = ctx.cli().arg(encoded).assert().success();

    let renderer = CertificateRenderer::from_assets(&ctx.assets_dir(), "template.html").unwrap();
    let markup = renderer.render_markup(&request).unwrap();
    let direct = DocumentConverter::new(ctx.assets_dir()).to_bytes(&markup).unwrap();
    assert_eq!(assert.get_output().stdout, direct);
}

#[test]
fn positional_call_writes_file_and_creates_directories() {
    let ctx = TestContext::new();
    let target = ctx.work_dir().join("gerador_certificado/certificados/2024/maria.pdf");

    ctx.cli()
        .args(["Maria Souza", "Formação Herbalista Pro", "15/03/2024", "file:///ignored.webp"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let bytes = std::fs::read(&target).unwrap();
    assert!(!bytes.is_empty());
    assert!(page_text_of(&bytes).contains("Maria Souza"));
}

#[test]
fn relative_output_path_is_resolved_from_working_directory() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["Ana", "Ervas", "2024", "legacy", "saida/ana.pdf"])
        .assert()
        .success();

    assert!(ctx.work_dir().join("saida/ana.pdf").is_file());
}

#[test]
fn repeated_calls_produce_identical_files() {
    let ctx = TestContext::new();
    let args = ["Ana Lima", "Fitoterapia", "10/10/2024", "x", "out/ana.pdf"];

    ctx.cli().args(args).assert().success();
    let first = std::fs::read(ctx.work_dir().join("out/ana.pdf")).unwrap();
    ctx.cli().args(args).assert().success();
    let second = std::fs::read(ctx.work_dir().join("out/ana.pdf")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn too_few_arguments_fail_with_count() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["Ana", "Ervas", "2024"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("expected 5 arguments, received 3"));

    let entries = std::fs::read_dir(ctx.work_dir()).unwrap().count();
    assert_eq!(entries, 1, "only the assets directory should exist");
}

#[test]
fn missing_template_fails_without_output() {
    let ctx = TestContext::empty();

    ctx.cli()
        .args(["Ana", "Ervas", "2024", "x", "out/ana.pdf"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("error in script:"))
        .stderr(predicate::str::contains("template.html"));

    assert!(!ctx.work_dir().join("out/ana.pdf").exists());
}

#[test]
fn missing_template_in_byte_mode_fails_with_empty_stdout() {
    let ctx = TestContext::empty();
    let json = r#"{"student_name":"A","course_name":"B","completion_date":"C"}"#;

    ctx.cli()
        .arg(payload(json))
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn empty_values_still_render() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["", "", "", "", "vazio.pdf"])
        .assert()
        .success();

    let bytes = std::fs::read(ctx.work_dir().join("vazio.pdf")).unwrap();
    let text = page_text_of(&bytes);
    assert!(text.contains("CERTIFICADO"));
    assert!(text.contains("Certificamos que"));
}

#[test]
fn invalid_payloads_are_rejected() {
    let ctx = TestContext::new();

    ctx.cli()
        .arg("%%% not base64 %%%")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("invalid base64 payload"));

    ctx.cli()
        .arg(payload("{ not json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid certificate payload"));
}

#[test]
fn payload_with_output_path_selects_file_mode() {
    let ctx = TestContext::new();
    let json = r#"{"student_name":"Ana","course_name":"Ervas","completion_date":"2024","output_path":"pdfs/ana.pdf"}"#;

    ctx.cli()
        .arg(payload(json))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(ctx.work_dir().join("pdfs/ana.pdf").is_file());
}

#[test]
fn markup_characters_survive_verbatim() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["Ana & Bia", "Chás <Medicinais>", "1/1/2025", "x", "chas.pdf"])
        .assert()
        .success();

    let text = page_text_of(&std::fs::read(ctx.work_dir().join("chas.pdf")).unwrap());
    assert!(text.contains("Ana & Bia"));
    assert!(text.contains("Chás <Medicinais>"));
}

#[test]
fn custom_assets_and_template_flags() {
    let ctx = TestContext::empty();
    let assets = ctx.work_dir().join("modelos");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(
        assets.join("simples.html"),
        "<p>{{ student_name }} / {{ course_name }} / {{ completion_date }}</p>",
    )
    .unwrap();

    ctx.cli()
        .args(["--assets", "modelos", "--template", "simples.html"])
        .args(["Ana", "Ervas", "2024", "x", "s.pdf"])
        .assert()
        .success();

    let text = page_text_of(&std::fs::read(ctx.work_dir().join("s.pdf")).unwrap());
    assert_eq!(text, "Ana / Ervas / 2024");
}

#[test]
fn missing_image_fails_and_leaves_no_file() {
    let ctx = TestContext::new();
    ctx.write_template(
        "template.html",
        "<img src=\"img/nao-existe.png\"><p>{{ student_name }}{{ course_name }}{{ completion_date }}</p>",
    );

    ctx.cli()
        .args(["Ana", "Ervas", "2024", "x", "out/ana.pdf"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nao-existe.png"));

    assert!(!ctx.work_dir().join("out/ana.pdf").exists());
}

#[test]
fn text_outside_latin1_survives_verbatim() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["Łukasz Żółć", "Ngô Bảo Châu", "2024年3月15日", "x", "u.pdf"])
        .assert()
        .success();

    let text = page_text_of(&std::fs::read(ctx.work_dir().join("u.pdf")).unwrap());
    assert!(text.contains("Łukasz Żółć"));
    assert!(text.contains("Ngô Bảo Châu"));
    assert!(text.contains("Concluído em 2024年3月15日"));
}

#[test]
fn hyphen_leading_student_name_is_a_value() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["-v", "Ervas", "2024", "x", "hifen.pdf"])
        .assert()
        .success();

    let text = page_text_of(&std::fs::read(ctx.work_dir().join("hifen.pdf")).unwrap());
    assert!(text.contains("\n-v\n"));
}

#[test]
fn transparent_frame_is_masked() {
    let ctx = TestContext::new();
    let mut frame = image::RgbaImage::from_pixel(297, 210, image::Rgba([0, 0, 0, 0]));
    for x in 0..297 {
        frame.put_pixel(x, 0, image::Rgba([46, 94, 62, 255]));
    }
    frame.save(ctx.assets_dir().join("img/moldura.png")).unwrap();

    ctx.cli()
        .args(["Ana", "Ervas", "2024", "x", "moldura.pdf"])
        .assert()
        .success();

    let bytes = std::fs::read(ctx.work_dir().join("moldura.pdf")).unwrap();
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    let masked = doc
        .objects
        .values()
        .filter_map(|obj| obj.as_stream().ok())
        .any(|stream| stream.dict.get(b"SMask").is_ok());
    assert!(masked);
    assert!(page_text_of(&bytes).contains("Ana"));
}
