//! Field normalization shared by the dedup, quality, verification and scoring engines.

use phonenumber::Mode;
use std::collections::BTreeSet;

/// Second-level labels that sit under a country code (`acme.co.uk`, `acme.com.br`).
const SECOND_LEVEL_SUFFIXES: [&str; 7] = ["co", "com", "org", "net", "ac", "gov", "edu"];

/// Trimmed content of an optional field, `None` when missing or blank.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Split "Ada King Lovelace" into ("Ada", "Lovelace").
pub fn split_full_name(full: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = full.split_whitespace().collect();
    match parts.len() {
        0 => (None, None),
        1 => (Some(parts[0].to_string()), None),
        n => (Some(parts[0].to_string()), Some(parts[n - 1].to_string())),
    }
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize a phone number to E.164 when it carries an international prefix.
///
/// Numbers without a `+` prefix are ambiguous without a region, so they are kept
/// as supplied (trimmed).
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with('+') {
        return trimmed.to_string();
    }
    match phonenumber::parse(None, trimmed) {
        Ok(number) if phonenumber::is_valid(&number) => {
            number.format().mode(Mode::E164).to_string()
        }
        Ok(_) | Err(_) => {
            tracing::debug!("Keeping unparseable phone as supplied: {}", trimmed);
            trimmed.to_string()
        }
    }
}

/// Edit-distance similarity ratio in [0, 1] of two names, ignoring case and spacing.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = collapse(a);
    let b = collapse(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

fn collapse(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercase alphanumeric word tokens.
pub fn tokens(s: &str) -> BTreeSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Lowercase ASCII letters and digits only, for building mailbox names.
pub fn mailbox_part(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Case-insensitive equality of two optional fields, false when either is missing.
pub fn same_text(a: &Option<String>, b: &Option<String>) -> bool {
    match (non_empty(a), non_empty(b)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

/// Host of a website, accepting bare domains ("acme.io") and dropping a leading "www.".
pub fn website_host(website: &str) -> Option<String> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return None;
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let parsed = url::Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Registrable label of a domain: "acme" for "mail.acme.co.uk" and "acme.com".
pub fn root_label(domain: &str) -> Option<String> {
    let labels: Vec<&str> = domain
        .trim()
        .trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .collect();
    let n = labels.len();
    match n {
        0 => None,
        1 => Some(labels[0].to_lowercase()),
        2 => Some(labels[0].to_lowercase()),
        _ => {
            let tld = labels[n - 1];
            let second = labels[n - 2];
            if tld.len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&second.to_lowercase().as_str()) {
                Some(labels[n - 3].to_lowercase())
            } else {
                Some(second.to_lowercase())
            }
        }
    }
}

/// Whether an email domain and a website belong to the same organisation.
pub fn domains_correlate(email: &str, website: &str) -> bool {
    let (Some(mail), Some(site)) = (email_domain(email), website_host(website)) else {
        return false;
    };
    if mail == site || mail.ends_with(&format!(".{}", site)) || site.ends_with(&format!(".{}", mail))
    {
        return true;
    }
    matches!((root_label(&mail), root_label(&site)), (Some(a), Some(b)) if a == b)
}

/// Person name embedded in a profile URL slug: ".../in/ada-lovelace-4b2a1" -> "ada lovelace".
pub fn profile_slug_name(profile_url: &str) -> Option<String> {
    let parsed = url::Url::parse(profile_url.trim()).ok()?;
    let mut segments = parsed.path_segments()?;
    let slug = loop {
        match segments.next() {
            Some("in") | Some("pub") => break segments.next()?,
            Some(_) => continue,
            None => return None,
        }
    };
    let words: Vec<String> = slug
        .split(['-', '_', '.'])
        .filter(|w| !w.is_empty() && !w.chars().any(|c| c.is_ascii_digit()))
        .map(|w| w.to_lowercase())
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
