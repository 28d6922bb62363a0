pub mod webdriver;

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::parser::links::{accept_link, LinkFilter};
use crate::parser::sample;
use crate::section::{clean_title, Section, SectionOutcome};

const LANDMARK: &str = ".message-body";
const FIRST_POST: &str = "article.message";
const SPOILER: &str = ".bbCodeSpoiler";
const SPOILER_BUTTON: &str = ".bbCodeSpoiler-button";
const SPOILER_CONTENT: &str = ".bbCodeSpoiler-content";
const LINK: &str = "a";

static POST_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"post-(\d+)").unwrap());

/// What the live pipeline needs from a browser. Elements are opaque handles
/// owned by the driver; selectors are CSS.
#[allow(async_fn_in_trait)]
pub trait PageDriver {
    type Element;

    async fn navigate(&self, url: &str) -> Result<()>;
    /// Block until `selector` matches something, or fail after `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;
    async fn find(&self, scope: Option<&Self::Element>, selector: &str) -> Result<Self::Element>;
    async fn find_all(
        &self,
        scope: Option<&Self::Element>,
        selector: &str,
    ) -> Result<Vec<Self::Element>>;
    /// Rendered text; empty for elements that are not displayed.
    async fn text(&self, element: &Self::Element) -> Result<String>;
    async fn attr(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;
    async fn is_displayed(&self, element: &Self::Element) -> Result<bool>;
    async fn click(&self, element: &Self::Element) -> Result<()>;
    async fn scroll_into_view(&self, element: &Self::Element) -> Result<()>;
    async fn pause(&self, duration: Duration);
    /// Terminate the browser.
    async fn quit(self) -> Result<()>
    where
        Self: Sized;
}

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub url: String,
    /// Only the first `limit` spoilers are genre lists; 0 processes all.
    pub limit: usize,
    pub filter: LinkFilter,
    pub page_timeout: Duration,
    pub load_settle: Duration,
    pub scroll_settle: Duration,
    pub expand_settle: Duration,
}

impl LiveOptions {
    pub fn new(url: &str, limit: usize, filter: LinkFilter) -> Self {
        Self {
            url: url.to_string(),
            limit,
            filter,
            page_timeout: Duration::from_secs(10),
            load_settle: Duration::from_secs(2),
            scroll_settle: Duration::from_millis(500),
            expand_settle: Duration::from_secs(1),
        }
    }
}

/// Run the live pipeline and always quit the driver afterwards.
pub async fn scrape_post<D: PageDriver>(driver: D, opts: &LiveOptions) -> Result<Vec<SectionOutcome>> {
    let result = collect(&driver, opts).await;

    info!("Closing browser...");
    if let Err(e) = driver.quit().await {
        warn!("Failed to close browser: {:#}", e);
    }

    result
}

async fn collect<D: PageDriver>(driver: &D, opts: &LiveOptions) -> Result<Vec<SectionOutcome>> {
    info!("Fetching {}...", opts.url);
    driver.navigate(&opts.url).await.context("Navigation failed")?;
    driver
        .wait_for(LANDMARK, opts.page_timeout)
        .await
        .with_context(|| format!("Page never rendered {}", LANDMARK))?;
    driver.pause(opts.load_settle).await;

    let post_selector = post_selector(&opts.url);
    let post = driver
        .find(None, &post_selector)
        .await
        .with_context(|| format!("Post {} not found", post_selector))?;
    driver.scroll_into_view(&post).await?;

    let spoilers = driver.find_all(Some(&post), SPOILER).await?;
    let total = match opts.limit {
        0 => spoilers.len(),
        n => n.min(spoilers.len()),
    };
    info!("Found {} spoilers, processing the first {}", spoilers.len(), total);

    let mut outcomes = Vec::with_capacity(total);
    for (index, spoiler) in spoilers.iter().take(total).enumerate() {
        let mut title = None;
        let outcome = match process_spoiler(driver, spoiler, opts, index, total, &mut title).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("  ERROR in spoiler {}: {:#}", index, e);
                SectionOutcome::skipped(index, title, format!("{:#}", e))
            }
        };
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

async fn process_spoiler<D: PageDriver>(
    driver: &D,
    spoiler: &D::Element,
    opts: &LiveOptions,
    index: usize,
    total: usize,
    title_slot: &mut Option<String>,
) -> Result<SectionOutcome> {
    driver.scroll_into_view(spoiler).await?;
    driver.pause(opts.scroll_settle).await;

    let button = driver.find(Some(spoiler), SPOILER_BUTTON).await?;
    let title = clean_title(&driver.text(&button).await?);
    *title_slot = Some(title.clone());
    info!("[{}/{}] Processing: {}", index + 1, total, title);

    let content = driver.find(Some(spoiler), SPOILER_CONTENT).await?;
    let expanded = if is_hidden(driver, &content).await? {
        info!("  Clicking to expand...");
        driver.click(&button).await?;
        driver.pause(opts.expand_settle).await;
        true
    } else {
        debug!("  Already expanded");
        false
    };

    // Re-query: the old handle may be stale after the toggle.
    let content = driver.find(Some(spoiler), SPOILER_CONTENT).await?;
    let section = Section {
        title,
        content: driver.text(&content).await?,
        expanded,
    };
    debug!(expanded = section.expanded, "  Content length: {} characters", section.content.chars().count());

    let mut documents = Vec::new();
    for link in driver.find_all(Some(&content), LINK).await? {
        let href = driver.attr(&link, "href").await?;
        let text = driver.text(&link).await?;
        if let Some(name) = accept_link(href.as_deref(), &text, opts.filter) {
            documents.push(name);
        }
    }

    info!("  Found {} document links", documents.len());
    if !documents.is_empty() {
        info!("  Sample: {}", sample(&documents));
    }

    Ok(SectionOutcome::classified(index, section.title, documents))
}

async fn is_hidden<D: PageDriver>(driver: &D, content: &D::Element) -> Result<bool> {
    let style = driver.attr(content, "style").await?.unwrap_or_default();
    Ok(style.contains("none") || !driver.is_displayed(content).await?)
}

/// The post a URL points at, or the first post on the page.
fn post_selector(url: &str) -> String {
    match POST_ID_RE.captures(url) {
        Some(caps) => format!("#js-post-{}", &caps[1]),
        None => FIRST_POST.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use anyhow::anyhow;

    use super::*;
    use crate::genre::Genre;

    #[derive(Debug, Clone, Default)]
    struct Node {
        parent: Option<usize>,
        tag: &'static str,
        class: &'static str,
        id: Option<String>,
        text: String,
        href: Option<String>,
        style: Option<String>,
        displayed: bool,
        reveals: Option<usize>,
    }

    /// In-memory page: a flat node list in document order.
    #[derive(Default)]
    struct FakePage {
        nodes: RefCell<Vec<Node>>,
        visited: RefCell<Vec<String>>,
        clicks: Cell<usize>,
        quit: Rc<Cell<bool>>,
    }

    impl FakePage {
        fn push(&self, node: Node) -> usize {
            let mut nodes = self.nodes.borrow_mut();
            nodes.push(node);
            nodes.len() - 1
        }

        fn el(&self, parent: Option<usize>, tag: &'static str, class: &'static str) -> usize {
            self.push(Node { parent, tag, class, displayed: true, ..Default::default() })
        }

        /// Article `#js-post-<id>` with a message body.
        fn post(&self, id: u32) -> usize {
            let article = self.push(Node {
                tag: "article",
                class: "message",
                id: Some(format!("js-post-{id}")),
                displayed: true,
                ..Default::default()
            });
            self.el(Some(article), "article", "message-body")
        }

        fn spoiler(&self, body: usize, title: &str, visible: bool, links: &[(&str, &str)]) -> usize {
            let spoiler = self.el(Some(body), "div", "bbCodeSpoiler");
            let button = self.push(Node {
                parent: Some(spoiler),
                tag: "button",
                class: "bbCodeSpoiler-button",
                text: format!("Spoiler: {title}"),
                displayed: true,
                ..Default::default()
            });
            let content = self.push(Node {
                parent: Some(spoiler),
                tag: "div",
                class: "bbCodeSpoiler-content",
                text: links.iter().map(|(_, t)| *t).collect::<Vec<_>>().join("\n"),
                style: (!visible).then(|| "display: none".to_string()),
                displayed: visible,
                ..Default::default()
            });
            self.nodes.borrow_mut()[button].reveals = Some(content);
            for (href, text) in links {
                self.push(Node {
                    parent: Some(content),
                    tag: "a",
                    text: text.to_string(),
                    href: Some(href.to_string()),
                    displayed: true,
                    ..Default::default()
                });
            }
            spoiler
        }

        fn matches(node: &Node, selector: &str) -> bool {
            if let Some(id) = selector.strip_prefix('#') {
                return node.id.as_deref() == Some(id);
            }
            let (tag, class) = selector.split_once('.').unwrap_or((selector, ""));
            (tag.is_empty() || node.tag == tag) && (class.is_empty() || node.class == class)
        }

        fn within(nodes: &[Node], mut idx: usize, scope: usize) -> bool {
            while let Some(parent) = nodes[idx].parent {
                if parent == scope {
                    return true;
                }
                idx = parent;
            }
            false
        }

        fn visible(nodes: &[Node], idx: usize) -> bool {
            let mut cur = Some(idx);
            while let Some(i) = cur {
                if !nodes[i].displayed {
                    return false;
                }
                cur = nodes[i].parent;
            }
            true
        }
    }

    impl PageDriver for FakePage {
        type Element = usize;

        async fn navigate(&self, url: &str) -> Result<()> {
            self.visited.borrow_mut().push(url.to_string());
            Ok(())
        }

        async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<()> {
            match self.find(None, selector).await {
                Ok(_) => Ok(()),
                Err(_) => Err(anyhow!("timed out waiting for {selector}")),
            }
        }

        async fn find(&self, scope: Option<&usize>, selector: &str) -> Result<usize> {
            self.find_all(scope, selector)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no such element: {selector}"))
        }

        async fn find_all(&self, scope: Option<&usize>, selector: &str) -> Result<Vec<usize>> {
            let nodes = self.nodes.borrow();
            Ok((0..nodes.len())
                .filter(|&i| scope.map_or(true, |s| Self::within(&nodes, i, *s)))
                .filter(|&i| Self::matches(&nodes[i], selector))
                .collect())
        }

        async fn text(&self, element: &usize) -> Result<String> {
            let nodes = self.nodes.borrow();
            Ok(if Self::visible(&nodes, *element) {
                nodes[*element].text.clone()
            } else {
                String::new()
            })
        }

        async fn attr(&self, element: &usize, name: &str) -> Result<Option<String>> {
            let nodes = self.nodes.borrow();
            let node = &nodes[*element];
            Ok(match name {
                "href" => node.href.clone(),
                "style" => node.style.clone(),
                _ => None,
            })
        }

        async fn is_displayed(&self, element: &usize) -> Result<bool> {
            Ok(Self::visible(&self.nodes.borrow(), *element))
        }

        async fn click(&self, element: &usize) -> Result<()> {
            self.clicks.set(self.clicks.get() + 1);
            let mut nodes = self.nodes.borrow_mut();
            if let Some(target) = nodes[*element].reveals {
                nodes[target].displayed = true;
                nodes[target].style = None;
            }
            Ok(())
        }

        async fn scroll_into_view(&self, _element: &usize) -> Result<()> {
            Ok(())
        }

        async fn pause(&self, _duration: Duration) {}

        async fn quit(self) -> Result<()> {
            self.quit.set(true);
            Ok(())
        }
    }

    const URL: &str = "https://forums.example.test/threads/jumps.1/post-42";
    const DOC: &str = "https://docs.google.com/document/d/1/edit";
    const DRIVE: &str = "https://drive.google.com/file/d/2/view";

    fn opts(limit: usize) -> LiveOptions {
        LiveOptions::new(URL, limit, LinkFilter::DocumentHosts)
    }

    #[tokio::test]
    async fn hidden_spoilers_are_expanded() {
        let page = FakePage::default();
        let body = page.post(42);
        page.spoiler(body, "Horror Jumps", false, &[(DOC, "Alien"), (DRIVE, " Saw ")]);
        page.spoiler(body, "Urban Fantasy", true, &[(DOC, "Dresden Files")]);
        let quit = Rc::clone(&page.quit);

        let outcomes = scrape_post(page, &opts(10)).await.unwrap();

        assert!(quit.get());
        assert_eq!(
            outcomes[0],
            SectionOutcome::Mapped {
                index: 0,
                title: "Horror Jumps".into(),
                genre: Genre::Horror,
                documents: vec!["Alien".into(), "Saw".into()],
            }
        );
        assert!(matches!(&outcomes[1], SectionOutcome::Mapped { genre: Genre::ModernOccult, .. }));
    }

    #[tokio::test]
    async fn visible_spoilers_not_clicked() {
        let page = FakePage::default();
        let body = page.post(42);
        page.spoiler(body, "Military", true, &[(DOC, "Halo")]);
        page.spoiler(body, "Horror", false, &[(DOC, "Alien")]);

        let outcomes = collect(&page, &opts(0)).await.unwrap();
        assert_eq!(page.clicks.get(), 1);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(page.visited.borrow().as_slice(), [URL]);
    }

    #[tokio::test]
    async fn only_first_ten_spoilers() {
        let page = FakePage::default();
        let body = page.post(42);
        for i in 0..12 {
            page.spoiler(body, &format!("Extra {i}"), true, &[(DOC, "Doc")]);
        }

        assert_eq!(collect(&page, &opts(10)).await.unwrap().len(), 10);
        assert_eq!(collect(&page, &opts(0)).await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn unmapped_titles_pass_through() {
        let page = FakePage::default();
        let body = page.post(42);
        page.spoiler(body, "Jump Index", true, &[(DOC, "Master Index")]);

        let outcomes = collect(&page, &opts(10)).await.unwrap();
        assert!(matches!(&outcomes[0], SectionOutcome::Unmapped { title, documents, .. }
            if title == "Jump Index" && documents == &["Master Index"]));
    }

    #[tokio::test]
    async fn host_filter_applies_live() {
        let page = FakePage::default();
        let body = page.post(42);
        let links = [(DOC, "Alien"), ("https://forums.example.test/members/7/", "Poster"), (DOC, "ok")];
        page.spoiler(body, "Horror", true, &links);

        let outcomes = collect(&page, &opts(10)).await.unwrap();
        assert!(matches!(&outcomes[0], SectionOutcome::Mapped { documents, .. } if documents == &["Alien"]));

        let legacy = LiveOptions::new(URL, 10, LinkFilter::AnyHost);
        let outcomes = collect(&page, &legacy).await.unwrap();
        assert!(matches!(&outcomes[0], SectionOutcome::Mapped { documents, .. }
            if documents == &["Alien", "Poster"]));
    }

    #[tokio::test]
    async fn broken_spoiler_skipped_others_continue() {
        let page = FakePage::default();
        let body = page.post(42);
        page.el(Some(body), "div", "bbCodeSpoiler");
        page.spoiler(body, "Horror", true, &[(DOC, "Alien")]);

        let outcomes = collect(&page, &opts(10)).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(&outcomes[0], SectionOutcome::Skipped { index: 0, title: None, reason }
            if reason.contains("bbCodeSpoiler-button")));
        assert!(matches!(&outcomes[1], SectionOutcome::Mapped { index: 1, .. }));
    }

    #[tokio::test]
    async fn spoilers_outside_the_post_ignored() {
        let page = FakePage::default();
        let other = page.post(7);
        page.spoiler(other, "Horror", true, &[(DOC, "Elsewhere")]);
        let body = page.post(42);
        page.spoiler(body, "Survival", true, &[(DOC, "Don't Starve")]);

        let outcomes = collect(&page, &opts(10)).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], SectionOutcome::Mapped { genre: Genre::Survival, .. }));
    }

    #[tokio::test]
    async fn load_timeout_still_quits() {
        let page = FakePage::default();
        page.el(None, "div", "p-body");
        let quit = Rc::clone(&page.quit);

        let err = scrape_post(page, &opts(10)).await.unwrap_err();
        assert!(format!("{err:#}").contains("message-body"));
        assert!(quit.get());
    }

    #[test]
    fn post_selector_from_url() {
        assert_eq!(post_selector(URL), "#js-post-42");
        assert_eq!(post_selector("https://forums.example.test/threads/jumps.1/"), FIRST_POST);
    }
}
