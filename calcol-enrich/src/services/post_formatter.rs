//! Social media post formatter
//!
//! Builds a platform-specific post from a calculator and, optionally, its
//! enrichment record. Every post is capped at the platform limit: longer
//! content is cut to `max_length - 3` characters followed by `"..."`.
//! Lengths are counted in chars.

use super::text::truncate_with_ellipsis;
use crate::types::{CalculatorInfo, EnrichmentRecord};
use serde::{Deserialize, Serialize};

const SOCIAL_EMOJI: &str = "🧮";
const BASE_HASHTAGS: &str = "#Calculator #VintageTech";
const INSTAGRAM_MAX_HASHTAGS: usize = 30;
/// Headline label tag is only added while the post is shorter than this
const TWITTER_HEADLINE_ROOM: usize = 250;
/// Mastodon body text must leave room for the hashtags
const MASTODON_BODY_ROOM: usize = 450;

/// Target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Facebook,
    Instagram,
    LinkedIn,
    Reddit,
    Mastodon,
    Generic,
}

impl Platform {
    /// Case-insensitive; unknown names map to `Generic`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "twitter" | "x" => Platform::Twitter,
            "facebook" => Platform::Facebook,
            "instagram" => Platform::Instagram,
            "linkedin" => Platform::LinkedIn,
            "reddit" => Platform::Reddit,
            "mastodon" => Platform::Mastodon,
            _ => Platform::Generic,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter/X",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::LinkedIn => "LinkedIn",
            Platform::Reddit => "Reddit",
            Platform::Mastodon => "Mastodon",
            Platform::Generic => "Generic",
        }
    }

    /// Maximum post length in chars
    pub fn max_length(&self) -> usize {
        match self {
            Platform::Twitter => 280,
            Platform::Facebook => 5000,
            Platform::Instagram => 2200,
            Platform::LinkedIn => 3000,
            Platform::Reddit => 40000,
            Platform::Mastodon => 500,
            Platform::Generic => 2000,
        }
    }
}

/// Generated post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    /// Display name, e.g. "Twitter/X"
    pub platform: String,
    pub content: String,
    pub max_length: usize,
}

/// Format a post for `platform`
pub fn format_post(
    platform: &str,
    info: &CalculatorInfo,
    enrichment: Option<&EnrichmentRecord>,
) -> SocialPost {
    let platform = Platform::parse(platform);
    let prose = enrichment
        .and_then(|record| record.ai_prose.as_ref())
        .map(|ai| ai.content.as_str())
        .filter(|content| !content.trim().is_empty());
    let museum_urls: Vec<&str> = enrichment
        .map(|record| {
            record
                .museum_results
                .iter()
                .filter(|m| m.found)
                .map(|m| m.site_url.as_str())
                .collect()
        })
        .unwrap_or_default();

    let content = match platform {
        Platform::Twitter => twitter(info, prose),
        Platform::Facebook => facebook(info, prose, &museum_urls),
        Platform::Instagram => instagram(info, prose),
        Platform::LinkedIn => linkedin(info, prose),
        Platform::Reddit => reddit(info, prose, &museum_urls),
        Platform::Mastodon => mastodon(info, prose),
        Platform::Generic => generic(info, prose),
    };

    let max_length = platform.max_length();
    SocialPost {
        platform: platform.display_name().to_string(),
        content: truncate_with_ellipsis(&content, max_length),
        max_length,
    }
}

/// First sentence of 21..=199 chars, else the first 150 chars of the prose
pub fn extract_short_fact(content: &str) -> Option<String> {
    if content.trim().is_empty() {
        return None;
    }

    let sentence = content
        .split(|c| matches!(c, '.' | '!' | '?'))
        .map(str::trim)
        .find(|s| {
            let len = s.chars().count();
            len > 20 && len < 200
        });

    Some(match sentence {
        Some(sentence) => sentence.to_string(),
        None => truncate_with_ellipsis(content, 150),
    })
}

fn chars(text: &str) -> usize {
    text.chars().count()
}

fn hashtag(label: &str) -> Option<String> {
    let tag: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    (!tag.is_empty()).then(|| format!("#{}", tag))
}

/// Append label hashtags one by one while the post stays within `limit`
fn push_label_hashtags(content: &mut String, labels: &[String], limit: usize) {
    for tag in labels.iter().filter_map(|l| hashtag(l)) {
        if chars(content) + chars(&tag) + 1 <= limit {
            content.push(' ');
            content.push_str(&tag);
        }
    }
}

fn description(info: &CalculatorInfo) -> Option<&str> {
    info.description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
}

fn twitter(info: &CalculatorInfo, prose: Option<&str>) -> String {
    let limit = Platform::Twitter.max_length();
    let mut content = format!("{} {} {}", SOCIAL_EMOJI, info.manufacturer, info.model);

    // First two labels fused into one headline tag
    let headline = info.labels.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
    if let Some(tag) = hashtag(&headline) {
        if chars(&content) + chars(&headline) + 3 < TWITTER_HEADLINE_ROOM {
            content.push(' ');
            content.push_str(&tag);
        }
    }

    if let Some(fact) = prose.and_then(extract_short_fact) {
        if chars(&content) + chars(&fact) + 10 < limit {
            content.push_str("\n\n");
            content.push_str(&fact);
        }
    }

    content.push_str("\n\n");
    content.push_str(BASE_HASHTAGS);
    push_label_hashtags(&mut content, &info.labels, limit);
    content
}

fn facebook(info: &CalculatorInfo, prose: Option<&str>, museum_urls: &[&str]) -> String {
    let mut content = format!("{} {} {}\n\n", SOCIAL_EMOJI, info.manufacturer, info.model);

    if let Some(description) = description(info) {
        content.push_str(&format!("{}\n\n", description));
    }
    if !info.labels.is_empty() {
        content.push_str(&format!("Labels: {}\n\n", info.labels.join(", ")));
    }
    if let Some(prose) = prose {
        content.push_str(&format!("Interesting facts:\n{}\n\n", prose));
    }
    if !museum_urls.is_empty() {
        content.push_str("Related resources:\n");
        for url in museum_urls {
            content.push_str(&format!("• {}\n", url));
        }
    }
    content.trim_end().to_string()
}

fn instagram(info: &CalculatorInfo, prose: Option<&str>) -> String {
    let mut content = format!("{} {} {}\n\n", SOCIAL_EMOJI, info.manufacturer, info.model);

    if let Some(description) = description(info) {
        content.push_str(&format!("{}\n\n", description));
    }
    if !info.labels.is_empty() {
        content.push_str(&format!("✨ Features: {}\n\n", info.labels.join(" • ")));
    }
    if let Some(fact) = prose.and_then(extract_short_fact) {
        content.push_str(&format!("💡 {}\n\n", fact));
    }

    content.push_str(BASE_HASHTAGS);
    content.push_str(" #RetroTech");
    let room = INSTAGRAM_MAX_HASHTAGS - 3;
    for tag in info.labels.iter().filter_map(|l| hashtag(l)).take(room) {
        content.push(' ');
        content.push_str(&tag);
    }
    content
}

fn linkedin(info: &CalculatorInfo, prose: Option<&str>) -> String {
    let mut content = format!("Vintage Calculator: {} {}\n\n", info.manufacturer, info.model);

    if let Some(description) = description(info) {
        content.push_str(&format!("{}\n\n", description));
    }
    if let Some(prose) = prose {
        content.push_str(&format!("Historical Context:\n{}\n\n", prose));
    }
    if !info.labels.is_empty() {
        content.push_str(&format!("Key Features: {}\n\n", info.labels.join(", ")));
    }

    content.push_str("What's your favorite vintage calculator? Share your thoughts in the comments!\n\n");
    content.push_str("#VintageTechnology #Calculator #TechHistory #STEM");
    content
}

fn reddit(info: &CalculatorInfo, prose: Option<&str>, museum_urls: &[&str]) -> String {
    let mut content = format!("**{} {}**\n\n", info.manufacturer, info.model);

    if let Some(description) = description(info) {
        content.push_str(&format!("{}\n\n", description));
    }
    if !info.labels.is_empty() {
        content.push_str(&format!("**Features:** {}\n\n", info.labels.join(", ")));
    }
    if let Some(prose) = prose {
        content.push_str(&format!("**Interesting Facts:**\n\n{}\n\n", prose));
    }
    if !museum_urls.is_empty() {
        content.push_str("**Related Resources:**\n\n");
        for url in museum_urls {
            content.push_str(&format!("* [{}]({})\n", url, url));
        }
    }
    content.trim_end().to_string()
}

fn mastodon(info: &CalculatorInfo, prose: Option<&str>) -> String {
    let mut content = format!("{} {} {}", SOCIAL_EMOJI, info.manufacturer, info.model);

    if let Some(fact) = prose.and_then(extract_short_fact) {
        if chars(&content) + chars(&fact) + 10 < MASTODON_BODY_ROOM {
            content.push_str("\n\n");
            content.push_str(&fact);
        }
    }
    if let Some(description) = description(info) {
        if chars(&content) + chars(description) + 10 < MASTODON_BODY_ROOM {
            content.push_str("\n\n");
            content.push_str(description);
        }
    }

    content.push_str("\n\n");
    content.push_str(BASE_HASHTAGS);
    push_label_hashtags(&mut content, &info.labels, Platform::Mastodon.max_length());
    content
}

fn generic(info: &CalculatorInfo, prose: Option<&str>) -> String {
    let mut content = format!("{} {}\n\n", info.manufacturer, info.model);

    if let Some(description) = description(info) {
        content.push_str(&format!("{}\n\n", description));
    }
    if !info.labels.is_empty() {
        content.push_str(&format!("Labels: {}\n\n", info.labels.join(", ")));
    }
    if let Some(prose) = prose {
        content.push_str(prose);
    }
    content.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerativeResult, MuseumResult};

    fn hp35() -> CalculatorInfo {
        CalculatorInfo {
            manufacturer: "HP".to_string(),
            model: "35".to_string(),
            description: Some("The first handheld scientific calculator".to_string()),
            labels: vec!["Scientific".to_string(), "Pocket Size".to_string()],
            label_descriptions: vec![String::new(), String::new()],
            image_urls: Vec::new(),
        }
    }

    fn record_with_prose(prose: &str) -> EnrichmentRecord {
        EnrichmentRecord {
            ai_prose: Some(GenerativeResult {
                content: prose.to_string(),
                extracted_urls: Vec::new(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_platform_parse_and_limits() {
        assert_eq!(Platform::parse("X"), Platform::Twitter);
        assert_eq!(Platform::parse("twitter").max_length(), 280);
        assert_eq!(Platform::parse("LinkedIn").display_name(), "LinkedIn");
        assert_eq!(Platform::parse("reddit").max_length(), 40000);
        assert_eq!(Platform::parse("myspace"), Platform::Generic);
        assert_eq!(Platform::parse("").max_length(), 2000);
    }

    #[test]
    fn test_twitter_long_prose_stays_within_limit() {
        let prose = "word ".repeat(100);
        assert_eq!(prose.len(), 500);

        let post = format_post("twitter", &hp35(), Some(&record_with_prose(&prose)));
        assert_eq!(post.platform, "Twitter/X");
        assert_eq!(post.max_length, 280);
        assert!(post.content.chars().count() <= 280);
        assert!(post.content.starts_with("🧮 HP 35"));
        assert!(post.content.contains("#Calculator #VintageTech #Scientific #PocketSize"));
    }

    #[test]
    fn test_twitter_headline_tag_fuses_first_two_labels() {
        let mut info = hp35();
        info.labels.push("LED".to_string());

        let post = format_post("x", &info, None);
        assert_eq!(
            post.content,
            "🧮 HP 35 #ScientificPocketSize\n\n#Calculator #VintageTech #Scientific #PocketSize #LED"
        );

        info.labels.clear();
        let post = format_post("x", &info, None);
        assert_eq!(post.content, "🧮 HP 35\n\n#Calculator #VintageTech");
    }

    #[test]
    fn test_mastodon_has_fact_and_label_hashtags() {
        let info = CalculatorInfo {
            manufacturer: "HP".to_string(),
            model: "35".to_string(),
            labels: vec!["Scientific".to_string()],
            ..Default::default()
        };
        let post = format_post("mastodon", &info, None);
        assert_eq!(post.content, "🧮 HP 35\n\n#Calculator #VintageTech #Scientific");

        let record = record_with_prose("Short. The HP-35 replaced the slide rule for engineers!");
        let post = format_post("mastodon", &hp35(), Some(&record));
        assert_eq!(post.platform, "Mastodon");
        assert_eq!(
            post.content,
            "🧮 HP 35\n\nThe HP-35 replaced the slide rule for engineers\n\n\
             The first handheld scientific calculator\n\n\
             #Calculator #VintageTech #Scientific #PocketSize"
        );
    }

    #[test]
    fn test_mastodon_hashtags_respect_limit() {
        let info = CalculatorInfo {
            manufacturer: "HP".to_string(),
            model: "35".to_string(),
            description: Some("d".repeat(400)),
            labels: (0..40).map(|i| format!("Label{:02}", i)).collect(),
            ..Default::default()
        };
        let post = format_post("mastodon", &info, None);
        assert!(post.content.chars().count() <= 500);
        assert!(!post.content.ends_with("..."));
        assert!(post.content.contains("#Label00"));
        assert!(!post.content.contains("#Label39"));
    }

    #[test]
    fn test_overlong_content_is_truncated_with_ellipsis() {
        let info = CalculatorInfo {
            manufacturer: "M".repeat(300),
            model: "X".to_string(),
            ..Default::default()
        };
        let post = format_post("twitter", &info, None);
        assert_eq!(post.content.chars().count(), 280);
        assert!(post.content.ends_with("..."));

        let post = format_post("mastodon", &info, None);
        assert!(post.content.chars().count() <= 500);
    }

    #[test]
    fn test_short_fact_prefers_first_reasonable_sentence() {
        let fact = extract_short_fact("Short. The HP-35 replaced the slide rule for engineers! More.");
        assert_eq!(fact.as_deref(), Some("The HP-35 replaced the slide rule for engineers"));

        let long = "a".repeat(400);
        let fact = extract_short_fact(&long).unwrap();
        assert_eq!(fact.chars().count(), 150);
        assert!(fact.ends_with("..."));

        assert!(extract_short_fact("  ").is_none());
    }

    #[test]
    fn test_reddit_includes_found_museum_links() {
        let mut record = record_with_prose("The HP-35 was introduced in 1972 at $395.");
        record.museum_results = vec![
            MuseumResult {
                site_url: "https://www.hpmuseum.org/".to_string(),
                search_url: "https://www.hpmuseum.org/search.php?q=HP+35".to_string(),
                found: true,
                snippet: Some("HP 35".to_string()),
            },
            MuseumResult {
                site_url: "http://www.datamath.org/".to_string(),
                search_url: "http://www.datamath.org/".to_string(),
                found: false,
                snippet: None,
            },
        ];

        let post = format_post("reddit", &hp35(), Some(&record));
        assert!(post.content.starts_with("**HP 35**"));
        assert!(post.content.contains("**Features:** Scientific, Pocket Size"));
        assert!(post.content.contains("* [https://www.hpmuseum.org/](https://www.hpmuseum.org/)"));
        assert!(!post.content.contains("datamath"));

        let post = format_post("facebook", &hp35(), Some(&record));
        assert!(post.content.contains("• https://www.hpmuseum.org/"));
        assert!(post.content.contains("Interesting facts:\nThe HP-35 was introduced"));
    }

    #[test]
    fn test_linkedin_and_instagram_flavour() {
        let post = format_post("linkedin", &hp35(), None);
        assert!(post.content.starts_with("Vintage Calculator: HP 35"));
        assert!(post.content.contains("Share your thoughts in the comments!"));
        assert!(post.content.ends_with("#STEM"));

        let post = format_post("instagram", &hp35(), None);
        assert!(post.content.contains("✨ Features: Scientific • Pocket Size"));
        assert!(post.content.ends_with("#RetroTech #Scientific #PocketSize"));
    }

    #[test]
    fn test_generic_without_enrichment() {
        let post = format_post("unknown", &hp35(), None);
        assert_eq!(post.platform, "Generic");
        assert_eq!(
            post.content,
            "HP 35\n\nThe first handheld scientific calculator\n\nLabels: Scientific, Pocket Size"
        );
    }
}
