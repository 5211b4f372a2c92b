use std::path::PathBuf;

use mermaidview::config::{ConfigFlags, load_config_flags, load_file_flags, parse_flag_tokens};
use mermaidview::generate::{OutputFormat, Theme};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".mermaidviewrc");
    let content = r"
# comment
--verbose

--theme forest
   
--mmdc=/opt/mermaid/bin/mmdc
";
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.verbose);
    assert_eq!(flags.theme.as_deref(), Some("forest"));
    assert_eq!(flags.mmdc, Some(PathBuf::from("/opt/mermaid/bin/mmdc")));
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".mermaidviewrc");
    let content = "--verbose\n--theme forest\n--format svg\n--timeout 60\n";
    std::fs::write(&path, content).unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "mermaidview".to_string(),
        "generate".to_string(),
        "flow.mmd".to_string(),
        "--theme".to_string(),
        "dark".to_string(),
        "--width".to_string(),
        "1280".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.verbose, "file flags should remain enabled");
    assert_eq!(effective.width, Some(1280), "cli flags should be applied");
    assert_eq!(effective.theme.as_deref(), Some("dark"), "cli should override theme");
    assert_eq!(
        effective.timeout,
        Some(60),
        "file config should be preserved when CLI does not override"
    );

    let config = effective.generation_config().unwrap();
    assert_eq!(config.theme(), Theme::Dark);
    assert_eq!(config.format(), OutputFormat::Svg);
    assert_eq!(config.width(), 1280);
}

#[test]
fn test_parse_flag_tokens_handles_equals_syntax() {
    let args = vec![
        "mermaidview".to_string(),
        "--renderer=remote".to_string(),
        "--render-url=https://render.example".to_string(),
    ];
    let flags = parse_flag_tokens(&args);
    assert_eq!(flags.renderer.as_deref(), Some("remote"));
    assert_eq!(flags.render_url.as_deref(), Some("https://render.example"));
}

#[test]
fn test_config_union_merges_booleans() {
    let file = ConfigFlags {
        verbose: true,
        ..ConfigFlags::default()
    };
    let cli = ConfigFlags {
        scale: Some(2.0),
        ..ConfigFlags::default()
    };
    let merged = file.union(&cli);
    assert!(merged.verbose);
    assert_eq!(merged.scale, Some(2.0));
}

#[test]
fn test_missing_files_yield_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let flags = load_file_flags(&dir.path().join("absent"), &dir.path().join(".absentrc")).unwrap();
    assert_eq!(flags, ConfigFlags::default());
}
