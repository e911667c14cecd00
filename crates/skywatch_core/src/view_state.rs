use url::form_urlencoded;
use url::Url;

/// Key naming the panel that is currently in front.
pub const TAB_KEY: &str = "tab";

/// Tab shown when the address carries no `tab` key.
pub const DEFAULT_TAB: &str = "overview";

const FALLBACK_ORIGIN: &str = "http://localhost/";

/// Query-string backed selection shared by every panel.
///
/// Pairs keep their original order so that unknown keys written by one panel
/// are never reordered or dropped by another.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pairs: Vec<(String, String)>,
}

impl ViewState {
    /// Parses a query string permissively; a leading `?` is optional.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { pairs }
    }

    /// Value of the first occurrence of `key`. Empty keys and empty values read as absent.
    pub fn read(&self, key: &str) -> Option<&str> {
        if key.is_empty() {
            return None;
        }
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn tab(&self) -> &str {
        self.read(TAB_KEY).unwrap_or(DEFAULT_TAB)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.pairs[index].1 = value.to_string();
                let mut seen = 0usize;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// Merges `updates` into the current pairs. `None` or an empty value deletes the key.
    pub fn apply<I, K, V>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in updates {
            let key = key.as_ref();
            if key.is_empty() {
                continue;
            }
            let value: Option<&str> = value.as_ref().map(|v| v.as_ref());
            match value {
                Some(value) if !value.is_empty() => self.set(key, value),
                _ => self.remove(key),
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

/// An address: everything but the query, the parsed query, and the fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    base: Url,
    state: ViewState,
    fragment: Option<String>,
}

impl Default for Location {
    fn default() -> Self {
        Self::parse(FALLBACK_ORIGIN).expect("fallback origin is a valid url")
    }
}

impl Location {
    /// Parses an absolute URL, or a path resolved against a local origin.
    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        let url = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(FALLBACK_ORIGIN)?.join(href)?,
            Err(err) => return Err(err),
        };
        Ok(Self::from_url(url))
    }

    pub fn from_url(mut url: Url) -> Self {
        let state = url.query().map(ViewState::parse).unwrap_or_default();
        let fragment = url.fragment().map(str::to_string);
        url.set_query(None);
        url.set_fragment(None);
        Self {
            base: url,
            state,
            fragment,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn path(&self) -> &str {
        self.base.path()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Same path and fragment, new query.
    pub fn with_state(&self, state: ViewState) -> Self {
        Self {
            base: self.base.clone(),
            state,
            fragment: self.fragment.clone(),
        }
    }

    pub fn to_url(&self) -> Url {
        let mut url = self.base.clone();
        let query = self.state.to_query_string();
        if !query.is_empty() {
            url.set_query(Some(&query));
        }
        url.set_fragment(self.fragment.as_deref());
        url
    }

    /// Full address, suitable as a permalink.
    pub fn href(&self) -> String {
        self.to_url().to_string()
    }

    /// Path, query and fragment without the origin.
    pub fn relative_href(&self) -> String {
        let url = self.to_url();
        let mut out = url.path().to_string();
        if let Some(query) = url.query() {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}
