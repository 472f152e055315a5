use std::fmt;

use crate::{
    config::EmitMethod,
    error::{Result, ToolError},
    host::EventEmitter,
    models::Event,
};

const ALT_PROMPT_CHARS: usize = 50;
const HTML_FALLBACK_SIZE: u32 = 512;

/// One way of pushing an image towards the chat UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    /// Structured `image` event.
    Direct,
    /// `![alt](url)` as message content.
    Markdown,
    /// `<img>` tag as message content.
    Html,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Direct => "direct",
            DeliveryMethod::Markdown => "markdown",
            DeliveryMethod::Html => "html",
        }
    }

    pub fn render(&self, url: &str, width: Option<u32>, height: Option<u32>, alt: &str) -> Event {
        match self {
            DeliveryMethod::Direct => Event::Image {
                url: url.to_string(),
                width: width.filter(|w| *w > 0),
                height: height.filter(|h| *h > 0),
                alt: Some(alt.to_string()).filter(|a| !a.is_empty()),
            },
            DeliveryMethod::Markdown => Event::message(format!(
                "![{}]({})",
                escape_markdown_alt(alt),
                escape_markdown_url(url)
            )),
            DeliveryMethod::Html => Event::message(format!(
                "<img src=\"{}\" alt=\"{}\" style=\"max-width: {}px; max-height: {}px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1);\">",
                escape_html(url),
                escape_html(alt),
                width.filter(|w| *w > 0).unwrap_or(HTML_FALLBACK_SIZE),
                height.filter(|h| *h > 0).unwrap_or(HTML_FALLBACK_SIZE),
            )),
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Percent-encodes the characters that would end a Markdown link destination.
fn escape_markdown_url(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '(' => escaped.push_str("%28"),
            ')' => escaped.push_str("%29"),
            ' ' => escaped.push_str("%20"),
            '<' => escaped.push_str("%3C"),
            '>' => escaped.push_str("%3E"),
            '\n' => escaped.push_str("%0A"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_markdown_alt(alt: &str) -> String {
    let mut escaped = String::with_capacity(alt.len());
    for c in alt.chars() {
        if matches!(c, '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Alt text for the `index`-th (1-based) image of a prompt.
pub fn alt_text(prompt: &str, index: usize, auto: bool) -> String {
    if !auto {
        return format!("generated_image_{}", index);
    }
    let mut head: String = prompt.chars().take(ALT_PROMPT_CHARS).collect();
    if prompt.chars().count() > ALT_PROMPT_CHARS {
        head.push_str("...");
    }
    format!("Imagen generada: {} - #{}", head, index)
}

/// Tries each delivery method in priority order until one goes through.
pub struct Dispatcher<'a> {
    emitter: Option<&'a dyn EventEmitter>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(emitter: Option<&'a dyn EventEmitter>) -> Self {
        Self { emitter }
    }

    /// `true` once any method's emission completes without error.
    pub async fn deliver(
        &self,
        image: &str,
        width: Option<u32>,
        height: Option<u32>,
        alt: &str,
        priority: EmitMethod,
    ) -> bool {
        if image.is_empty() {
            log::warn!("Empty image reference, nothing to deliver");
            return false;
        }
        log::debug!(
            "Delivering image ({} chars, {:?}x{:?}) with priority {}",
            image.len(),
            width,
            height,
            priority
        );

        for method in priority.order() {
            log::debug!("Trying delivery method: {}", method);
            match self.try_method(method, image, width, height, alt).await {
                Ok(()) => {
                    log::info!("Image delivered with method {}", method);
                    return true;
                }
                Err(e) => log::warn!("Delivery method {} failed: {}", method, e),
            }
        }

        log::error!("All delivery methods failed");
        false
    }

    async fn try_method(
        &self,
        method: DeliveryMethod,
        image: &str,
        width: Option<u32>,
        height: Option<u32>,
        alt: &str,
    ) -> Result<()> {
        let emitter = self.emitter.ok_or(ToolError::EmitterUnavailable)?;
        emitter.emit(method.render(image, width, height, alt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every attempt; fails those whose kind/content matches `fail_on`.
    struct ScriptedEmitter {
        fail_on: Vec<DeliveryMethod>,
        attempts: Mutex<Vec<DeliveryMethod>>,
    }

    impl ScriptedEmitter {
        fn failing(fail_on: Vec<DeliveryMethod>) -> Self {
            Self {
                fail_on,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<DeliveryMethod> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventEmitter for ScriptedEmitter {
        async fn emit(&self, event: Event) -> Result<()> {
            let method = match &event {
                Event::Image { .. } => DeliveryMethod::Direct,
                Event::Message { content } if content.starts_with("<img") => DeliveryMethod::Html,
                Event::Message { .. } => DeliveryMethod::Markdown,
                Event::Status { .. } => unreachable!("dispatcher never emits status"),
            };
            self.attempts.lock().unwrap().push(method);
            if self.fail_on.contains(&method) {
                Err(ToolError::Transport(format!("{} unavailable", method)))
            } else {
                Ok(())
            }
        }
    }

    const URL: &str = "https://example.com/x.png";

    #[tokio::test]
    async fn test_first_method_wins() {
        let emitter = ScriptedEmitter::failing(vec![]);
        let dispatcher = Dispatcher::new(Some(&emitter));
        assert!(dispatcher.deliver(URL, Some(512), Some(512), "alt", EmitMethod::Markdown).await);
        assert_eq!(emitter.attempts(), vec![DeliveryMethod::Markdown]);
    }

    #[tokio::test]
    async fn test_failing_html_falls_back_in_order() {
        use DeliveryMethod::*;
        let emitter = ScriptedEmitter::failing(vec![Html]);
        let dispatcher = Dispatcher::new(Some(&emitter));
        assert!(dispatcher.deliver(URL, None, None, "", EmitMethod::Html).await);
        assert_eq!(emitter.attempts(), vec![Html, Direct]);
    }

    #[tokio::test]
    async fn test_all_methods_attempted_before_failure() {
        use DeliveryMethod::*;
        let emitter = ScriptedEmitter::failing(vec![Direct, Markdown, Html]);
        let dispatcher = Dispatcher::new(Some(&emitter));
        assert!(!dispatcher.deliver(URL, None, None, "", EmitMethod::Html).await);
        assert_eq!(emitter.attempts(), vec![Html, Direct, Markdown]);
    }

    #[tokio::test]
    async fn test_empty_image_and_missing_emitter_fail() {
        let emitter = ScriptedEmitter::failing(vec![]);
        assert!(!Dispatcher::new(Some(&emitter)).deliver("", None, None, "", EmitMethod::Auto).await);
        assert!(emitter.attempts().is_empty());
        assert!(!Dispatcher::new(None).deliver(URL, None, None, "", EmitMethod::Auto).await);
    }

    #[test]
    fn test_render_direct_omits_empty_fields() {
        let event = DeliveryMethod::Direct.render(URL, Some(0), Some(256), "");
        assert_eq!(
            event,
            Event::Image {
                url: URL.into(),
                width: None,
                height: Some(256),
                alt: None
            }
        );
    }

    #[test]
    fn test_render_markdown_and_html() {
        assert_eq!(
            DeliveryMethod::Markdown.render(URL, None, None, "cat"),
            Event::message(format!("![cat]({})", URL))
        );
        let Event::Message { content } = DeliveryMethod::Html.render(URL, Some(300), None, "a \"b\"") else {
            panic!("html renders a message");
        };
        assert!(content.starts_with(&format!("<img src=\"{}\" alt=\"a &quot;b&quot;\"", URL)));
        assert!(content.contains("max-width: 300px; max-height: 512px;"));
    }

    #[test]
    fn test_render_keeps_hostile_url_inside_markup() {
        let url = "https://example.com/a\" onerror=\"x.png?q=(1) [2]";
        let Event::Message { content } = DeliveryMethod::Html.render(url, None, None, "cat") else {
            panic!("html renders a message");
        };
        assert!(content.starts_with(
            "<img src=\"https://example.com/a&quot; onerror=&quot;x.png?q=(1) [2]\" alt=\"cat\""
        ));

        let Event::Message { content } = DeliveryMethod::Markdown.render(url, None, None, "a [b]") else {
            panic!("markdown renders a message");
        };
        assert_eq!(
            content,
            "![a \\[b\\]](https://example.com/a\"%20onerror=\"x.png?q=%281%29%20[2])"
        );
    }

    #[test]
    fn test_alt_text() {
        assert_eq!(alt_text("a red cat", 1, true), "Imagen generada: a red cat - #1");
        let long = "x".repeat(60);
        assert_eq!(
            alt_text(&long, 2, true),
            format!("Imagen generada: {}... - #2", "x".repeat(50))
        );
        assert_eq!(alt_text("a red cat", 3, false), "generated_image_3");
    }
}
