use super::*;

#[test]
fn test_strip_surrounding_quotes() {
    assert_eq!(strip_surrounding_quotes("\"/tmp/clip.mp4\""), "/tmp/clip.mp4");
    assert_eq!(strip_surrounding_quotes("'/tmp/clip.mp4'"), "/tmp/clip.mp4");
    assert_eq!(strip_surrounding_quotes("  /tmp/clip.mp4  "), "/tmp/clip.mp4");
    assert_eq!(strip_surrounding_quotes("/tmp/clip.mp4"), "/tmp/clip.mp4");
    // mismatched quotes are left alone
    assert_eq!(strip_surrounding_quotes("\"/tmp/clip.mp4'"), "\"/tmp/clip.mp4'");
    assert_eq!(strip_surrounding_quotes("\""), "\"");
}

#[test]
fn test_suggested_title() {
    assert_eq!(
        suggested_title("/videos/My Holiday.mp4").as_deref(),
        Some("My Holiday")
    );
    assert_eq!(suggested_title("clip.mov").as_deref(), Some("clip"));
    assert_eq!(suggested_title(""), None);
}

#[test]
fn test_watch_url() {
    assert_eq!(
        watch_url("dQw4w9WgXcQ"),
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
    );
}

#[test]
fn test_expand_tilde() {
    assert_eq!(expand_tilde("/tmp/video.mp4"), "/tmp/video.mp4");
    assert_eq!(expand_tilde("relative/path"), "relative/path");

    if let Some(home) = dirs::home_dir() {
        let expanded = expand_tilde("~/video.mp4");
        assert_eq!(expanded, home.join("video.mp4").to_string_lossy());
    }
}
