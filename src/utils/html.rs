// src/utils/html.rs

/// Sanitises imported question markup with ammonia's whitelist.
///
/// Safe formatting tags (<b>, <p>, <i>) survive; scripts, iframes and event
/// handler attributes are stripped. Statements come from third-party exam
/// dumps and are rendered as HTML by clients.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_but_keeps_formatting() {
        let cleaned = clean_html("<p>Art. <b>5º</b></p><script>alert(1)</script>");
        assert_eq!(cleaned, "<p>Art. <b>5º</b></p>");
    }

    #[test]
    fn strips_event_handlers() {
        let cleaned = clean_html(r#"<i onclick="steal()">Lei</i>"#);
        assert_eq!(cleaned, "<i>Lei</i>");
    }
}
