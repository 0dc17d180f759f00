//! Server-side rendering of the chat page.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};
use pulldown_cmark_escape::escape_html;
use whatski_core::Transcript;
use whatski_core::model::MessageRole;

const TITLE: &str = "WhatSki - AI Ski Advisor";
const HEADING: &str = "I am WhatSki 🎿";
const INTRO: &str = "Your AI-powered ski expert! Let’s find you the perfect \
    skis based on your style, terrain, and preferences. Just start chatting, \
    and I'll ask you a few questions before making a recommendation.";
const PLACEHOLDER: &str = "Ask me about skis!";

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #f4f7fb; color: #1c2733; }
main { max-width: 46rem; margin: 0 auto; padding: 1.5rem 1rem 7rem; }
header { text-align: center; }
header .logo { font-size: 4rem; }
.banner { background: #fde8e8; border: 1px solid #f5b5b5; border-radius: .5rem; padding: .75rem 1rem; }
.chat { display: flex; flex-direction: column; gap: .75rem; margin-top: 1.5rem; }
.bubble { border-radius: .75rem; padding: .6rem .9rem; max-width: 85%; box-shadow: 0 1px 2px rgba(0,0,0,.08); }
.bubble.user { align-self: flex-end; background: #d9ecff; }
.bubble.assistant { align-self: flex-start; background: #fff; }
.bubble .label { display: block; font-size: .75rem; font-weight: 600; opacity: .6; }
.bubble .content p:first-child { margin-top: .25rem; }
.bubble .content p:last-child { margin-bottom: 0; }
form { position: fixed; bottom: 0; left: 0; right: 0; display: flex; gap: .5rem; padding: 1rem; background: #f4f7fb; max-width: 46rem; margin: 0 auto; }
form input { flex: 1; padding: .7rem; border: 1px solid #b8c4d0; border-radius: .5rem; font-size: 1rem; }
form button { padding: .7rem 1.2rem; border: 0; border-radius: .5rem; background: #1f6feb; color: #fff; font-size: 1rem; }
"#;

/// Renders the whole page for a transcript.
///
/// `banner` is shown above the chat when the session is degraded.
pub fn render(transcript: &Transcript, banner: Option<&str>) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("<meta charset=\"utf-8\">\n");
    out.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
    );
    out.push_str(&format!("<title>{}</title>\n", escape(TITLE)));
    out.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n<main>\n"));

    out.push_str("<header>\n<div class=\"logo\">⛷️</div>\n");
    out.push_str(&format!("<h1>{}</h1>\n", escape(HEADING)));
    out.push_str(&format!("<p>{}</p>\n</header>\n", escape(INTRO)));

    if let Some(banner) = banner {
        out.push_str(&format!(
            "<div class=\"banner\" role=\"alert\">{}</div>\n",
            escape(banner)
        ));
    }

    out.push_str("<section class=\"chat\">\n");
    let count = transcript.len();
    for (idx, msg) in transcript.messages().iter().enumerate() {
        let (class, label, content) = match msg.role() {
            MessageRole::User => {
                ("user", "You", format!("<p>{}</p>", escape(msg.content())))
            }
            MessageRole::Assistant => {
                ("assistant", "WhatSki", markdown(msg.content()))
            }
        };
        let anchor = if idx + 1 == count { " id=\"latest\"" } else { "" };
        out.push_str(&format!(
            "<article class=\"bubble {class}\"{anchor}>\
             <span class=\"label\">{label}</span>\
             <div class=\"content\">{content}</div></article>\n"
        ));
    }
    out.push_str("</section>\n");

    out.push_str(&format!(
        "<form method=\"post\" action=\"/chat\">\
         <input name=\"prompt\" placeholder=\"{}\" autocomplete=\"off\" \
         autofocus required>\
         <button type=\"submit\">Send</button></form>\n",
        escape(PLACEHOLDER)
    ));
    out.push_str("</main>\n</body>\n</html>\n");
    out
}

/// Renders Markdown to HTML. Raw HTML in the source is shown as text, and
/// links or images with a scheme other than http, https or mailto point
/// nowhere.
pub fn markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_safe_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_safe_url(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        event => event,
    });
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Returns `true` for relative URLs and for the http, https and mailto
/// schemes.
fn is_safe_url(url: &str) -> bool {
    // Browsers ignore whitespace and control characters inside a scheme.
    let url: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();
    match url.find([':', '/', '?', '#']) {
        Some(idx) if url[idx..].starts_with(':') => {
            matches!(&url[..idx], "http" | "https" | "mailto")
        }
        _ => true,
    }
}

/// Escapes text for use in HTML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing to a `String` never fails.
    let _ = escape_html(&mut out, text);
    out
}
