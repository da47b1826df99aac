//! Thread-local cache of compiled terminal patterns
//!
//! Terminal regexes are always matched at a path's cursor, so every pattern
//! is compiled in anchored form (`^(?:pattern)`). Compiled patterns are kept
//! per thread; paths scanned on worker threads build their own cache.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    /// Anchored pattern text -> compiled regex
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

fn anchored(pattern: &str) -> String {
    format!("^(?:{})", pattern)
}

/// Get or compile the anchored form of `pattern`
///
/// # Returns
/// * `Ok(Regex)` if the pattern is valid
/// * `Err(reason)` with the regex compiler's message otherwise
pub fn get_or_compile(pattern: &str) -> Result<Regex, String> {
    let key = anchored(pattern);
    REGEX_CACHE.with(|cache| {
        if let Some(regex) = cache.borrow().get(&key) {
            return Ok(regex.clone());
        }

        let regex = Regex::new(&key).map_err(|e| e.to_string())?;
        cache.borrow_mut().insert(key, regex.clone());
        Ok(regex)
    })
}

/// Length of the anchored match of `pattern` at the start of `text`
///
/// Invalid patterns never match; grammars are validated before any
/// matching happens, so this only guards against misuse.
#[inline]
pub fn match_len(pattern: &str, text: &str) -> Option<usize> {
    let regex = get_or_compile(pattern).ok()?;
    regex.find(text).map(|m| m.end())
}

/// Clear the cache for the current thread
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached patterns on the current thread
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
