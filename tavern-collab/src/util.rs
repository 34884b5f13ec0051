use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Matches a missing or present http(s) scheme at the start of a URL
    pub static ref URL_SCHEME_REGEX: Regex = Regex::new(r"^(https?://)?").unwrap();
}
