//! Well-known public wiki prefixes such as `enwiki` or `dewiktionary`.
//!
//! A predefined prefix is `<lang><project>`. The language part may contain
//! lowercase ASCII letters, digits and `_`, the latter mapping to `-` in the
//! host name (`zh_yuewiki` is `zh-yue.wikipedia.org`). Wikis hosted outside
//! that scheme (`commonswiki`, `metawiki`, ...) are listed explicitly.

use crate::model::EndpointRegistration;

/// Project suffixes and their host names. `wiki` must stay last so that the
/// longer suffixes sharing its prefix match first.
const PROJECTS: &[(&str, &str)] = &[
    ("wiktionary", "wiktionary"),
    ("wikiquote", "wikiquote"),
    ("wikibooks", "wikibooks"),
    ("wikisource", "wikisource"),
    ("wikinews", "wikinews"),
    ("wikiversity", "wikiversity"),
    ("wikivoyage", "wikivoyage"),
    ("wiki", "wikipedia"),
];

/// Wikimedia wikis whose host does not follow `<lang>.<project>.org`.
const SPECIAL_WIKIS: &[(&str, &str)] = &[
    ("commonswiki", "commons.wikimedia.org"),
    ("metawiki", "meta.wikimedia.org"),
    ("specieswiki", "species.wikimedia.org"),
    ("incubatorwiki", "incubator.wikimedia.org"),
    ("wikidatawiki", "www.wikidata.org"),
    ("mediawikiwiki", "www.mediawiki.org"),
];

/// Path of the action API on public wikis.
const API_PATH: &str = "/w/api.php";

/// Endpoint for a predefined prefix, if `prefix` names one.
pub fn predefined(prefix: &str) -> Option<EndpointRegistration> {
    if let Some((_, host)) = SPECIAL_WIKIS.iter().find(|(name, _)| *name == prefix) {
        return Some(endpoint(host.to_string(), prefix));
    }
    let (lang, project) = PROJECTS.iter().find_map(|(suffix, project)| {
        prefix
            .strip_suffix(suffix)
            .map(|lang| (lang, *project))
    })?;
    if !is_language_code(lang) {
        return None;
    }
    let domain = format!("{}.{project}.org", lang.replace('_', "-"));
    Some(endpoint(domain, prefix))
}

/// Endpoint for a public wiki host such as `fr.wikisource.org`.
pub fn predefined_by_domain(domain: &str) -> Option<EndpointRegistration> {
    if let Some((prefix, _)) = SPECIAL_WIKIS.iter().find(|(_, host)| *host == domain) {
        return predefined(prefix);
    }
    let (lang, rest) = domain.split_once('.')?;
    let project = rest.strip_suffix(".org")?;
    let (suffix, _) = PROJECTS.iter().find(|(_, name)| *name == project)?;
    predefined(&format!("{}{suffix}", lang.replace('-', "_")))
}

fn endpoint(domain: String, prefix: &str) -> EndpointRegistration {
    EndpointRegistration::new(format!("https://{domain}{API_PATH}"), domain).with_prefix(prefix)
}

fn is_language_code(lang: &str) -> bool {
    !lang.is_empty()
        && !lang.starts_with('_')
        && lang
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
