use scraper::node::Node;
use scraper::Html;

/// Flattens an HTML fragment into plain text.
///
/// Line breaks come from `<br>` tags and from the start of every block
/// element after the first piece of text.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::new();
    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            Node::Element(e) if is_block(e.name()) && !text.is_empty() => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn is_block(name: &str) -> bool {
    matches!(name, "p" | "div" | "li")
}

/// Collapses every run of consecutive `substring` repetitions into one.
pub fn remove_recurring_substrings(text: &str, substring: &str) -> String {
    if substring.is_empty() {
        return text.to_string();
    }
    let doubled = substring.repeat(2);
    let mut text = text.to_string();
    while text.contains(&doubled) {
        text = text.replace(&doubled, substring);
    }
    text
}

pub fn zerotify(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Points a slide link at the russian mirror.
pub fn rusificate_link(link: &str) -> String {
    let link = match link.strip_prefix("https://img5.reimg.org") {
        Some(rest) => format!("https://reimg2.org{rest}"),
        None => link.to_string(),
    };
    link.replace("reimg.org", "reimg2.org")
}

/// Cleans a site description for storage.
pub(crate) fn clean_description(html: &str) -> Option<String> {
    let text = html_to_text(html).replace('\r', "").replace('\u{a0}', " ");
    zerotify(remove_recurring_substrings(text.trim(), "\n"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_html_to_text() {
        assert_eq!(
            html_to_text("<p>first</p><p>second &amp; third</p>"),
            "first\nsecond & third"
        );
        assert_eq!(html_to_text("a<br>b<br/>c"), "a\nb\nc");
        assert_eq!(html_to_text("plain"), "plain");
    }

    #[test]
    fn test_remove_recurring_substrings() {
        let text = remove_recurring_substrings("a\n\n\n\nb\nc", "\n");
        assert_eq!(text, "a\nb\nc");
        assert_eq!(remove_recurring_substrings("abab", "ab"), "ab");
        assert_eq!(remove_recurring_substrings("text", ""), "text");
    }

    #[test]
    fn test_clean_description() {
        assert_eq!(
            clean_description("<p>\u{a0}Line one\r</p><br><br><p>Line two</p>"),
            Some("Line one\nLine two".to_string())
        );
        assert_eq!(clean_description("<p> </p>"), None);
    }

    #[test]
    fn test_rusificate_link() {
        assert_eq!(
            rusificate_link("https://img5.reimg.org/images/1.jpg"),
            "https://reimg2.org/images/1.jpg"
        );
        assert_eq!(
            rusificate_link("https://img3.reimg.org/images/1.jpg"),
            "https://img3.reimg2.org/images/1.jpg"
        );
        let link = "https://other.org/1.jpg";
        assert_eq!(rusificate_link(link), link);
    }
}
