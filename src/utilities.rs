use crate::edge::EdgeRequest;
use http::header::HOST;

pub struct Utilities;

impl Utilities {
    /// Joins a base URL and a path with exactly one slash between them.
    /// An absolute `http(s)://` path replaces the base entirely.
    pub fn concat_url(base: &str, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match (base.ends_with('/'), path.starts_with('/')) {
            (true, true) => format!("{}{}", base, &path[1..]),
            (false, false) if !path.is_empty() => format!("{}/{}", base, path),
            _ => format!("{}{}", base, path),
        }
    }

    /// `https://{Host}` for the incoming request, when it carries a host.
    pub fn self_base_url(request: &EdgeRequest) -> Option<String> {
        request
            .header(&HOST)
            .map(|host| format!("https://{}", host))
    }

    /// Appends a form-encoded query to a URL. Returns the URL unchanged for an empty query.
    pub fn append_query(url: &str, query: &[(String, String)]) -> String {
        if query.is_empty() {
            return url.to_string();
        }

        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query)
            .finish();

        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, encoded)
    }

    /// Merges query pairs, with later entries replacing earlier ones of the same key
    /// while keeping the first position.
    pub fn merge_query(
        base: Vec<(String, String)>,
        overrides: &[(String, String)],
    ) -> Vec<(String, String)> {
        let mut merged = base;
        for (key, value) in overrides {
            match merged.iter_mut().find(|(existing, _)| existing == key) {
                Some(entry) => entry.1 = value.clone(),
                None => merged.push((key.clone(), value.clone())),
            }
        }
        merged
    }
}
