// src/sitemap.rs
//
// XML sitemaps for the public site: static pages, tool pages and the public
// render gallery, tied together by a sitemap index.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use std::fmt::Write;
use uuid::Uuid;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Child sitemaps listed in `/sitemap.xml`.
pub const CHILD_SITEMAPS: &[&str] = &["sitemap-pages.xml", "sitemap-tools.xml", "sitemap-gallery.xml"];

const STATIC_PAGES: &[(&str, &str, f32)] = &[
    ("", "daily", 1.0),
    ("/apps", "weekly", 0.9),
    ("/render", "weekly", 0.9),
    ("/canvas", "weekly", 0.8),
    ("/gallery", "daily", 0.8),
    ("/use-cases", "weekly", 0.8),
    ("/plugins", "weekly", 0.8),
    ("/ai-architecture-tools", "weekly", 0.8),
    ("/ai-rendering-software", "weekly", 0.8),
    ("/blog", "weekly", 0.7),
    ("/docs", "weekly", 0.7),
    ("/help", "monthly", 0.6),
    ("/about", "monthly", 0.6),
    ("/contact", "monthly", 0.5),
    ("/support", "monthly", 0.5),
    ("/investors", "monthly", 0.4),
    ("/privacy", "yearly", 0.3),
    ("/terms", "yearly", 0.3),
    ("/cookies", "yearly", 0.3),
    ("/refund", "yearly", 0.3),
    ("/dpa", "yearly", 0.3),
];

pub const TOOL_SLUGS: &[&str] = &[
    "render-section-drawing",
    "render-to-cad",
    "render-upscale",
    "render-effects",
    "floorplan-to-furnished",
    "floorplan-to-3d",
    "floorplan-technical-diagrams",
    "exploded-diagram",
    "multi-angle-view",
    "change-texture",
    "material-alteration",
    "change-lighting",
    "upholstery-change",
    "product-placement",
    "item-change",
    "moodboard-to-render",
    "3d-to-render",
    "sketch-to-render",
    "presentation-board-maker",
    "portfolio-layout-generator",
    "presentation-sequence-creator",
];

pub const USE_CASE_SLUGS: &[&str] = &[
    "2d-elevations-from-images",
    "concept-renders",
    "design-iteration",
    "initial-prototyping",
    "instant-floor-plan-renders",
    "massing-testing",
    "matching-render-mood",
    "material-testing",
    "material-testing-built-spaces",
    "presentation-ready-graphics",
    "rapid-concept-video",
    "real-time-visualization",
    "social-media-content",
    "style-testing-white-renders",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: DateTime<Utc>,
    pub changefreq: &'static str,
    pub priority: f32,
}

fn base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

fn w3c(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn page_urls(base_url: &str, now: DateTime<Utc>) -> Vec<SitemapUrl> {
    let root = base(base_url);
    let pages = STATIC_PAGES.iter().map(|(path, changefreq, priority)| SitemapUrl {
        loc: format!("{root}{path}"),
        lastmod: now,
        changefreq,
        priority: *priority,
    });
    let use_cases = USE_CASE_SLUGS.iter().map(|slug| SitemapUrl {
        loc: format!("{root}/use-cases/{slug}"),
        lastmod: now,
        changefreq: "monthly",
        priority: 0.7,
    });
    pages.chain(use_cases).collect()
}

pub fn tool_urls(base_url: &str, now: DateTime<Utc>) -> Vec<SitemapUrl> {
    let root = base(base_url);
    TOOL_SLUGS
        .iter()
        .map(|slug| SitemapUrl {
            loc: format!("{root}/apps/{slug}"),
            lastmod: now,
            changefreq: "weekly",
            priority: 0.8,
        })
        .collect()
}

pub fn gallery_urls(base_url: &str, renders: &[(Uuid, DateTime<Utc>)]) -> Vec<SitemapUrl> {
    let root = base(base_url);
    renders
        .iter()
        .map(|(id, updated_at)| SitemapUrl {
            loc: format!("{root}/gallery/{id}"),
            lastmod: *updated_at,
            changefreq: "monthly",
            priority: 0.6,
        })
        .collect()
}

/// `<urlset>` document.
pub fn render_urlset(urls: &[SitemapUrl]) -> String {
    let mut xml = String::with_capacity(128 + urls.len() * 160);
    xml.push_str(XML_HEADER);
    let _ = write!(xml, "\n<urlset xmlns=\"{SITEMAP_NS}\">\n");
    for url in urls {
        let _ = write!(
            xml,
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
            escape(url.loc.as_str()),
            w3c(url.lastmod),
            url.changefreq,
            url.priority
        );
    }
    xml.push_str("</urlset>\n");
    xml
}

/// `<sitemapindex>` pointing at the child sitemaps.
pub fn render_index(base_url: &str, now: DateTime<Utc>) -> String {
    let root = base(base_url);
    let mut xml = String::from(XML_HEADER);
    let _ = write!(xml, "\n<sitemapindex xmlns=\"{SITEMAP_NS}\">\n");
    for child in CHILD_SITEMAPS {
        let loc = format!("{root}/{child}");
        let _ = write!(
            xml,
            "  <sitemap>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n  </sitemap>\n",
            escape(loc.as_str()),
            w3c(now)
        );
    }
    xml.push_str("</sitemapindex>\n");
    xml
}
