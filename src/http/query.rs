//! Query-string splitting for request resources.

use memchr::memchr;
use std::collections::HashMap;

/// Splitter for the query component of a request resource.
///
/// The input is expected to be percent-decoded already — the parser
/// decodes the whole resource token once before splitting, so `&` and `=`
/// that arrived encoded take part in the split. Values are never decoded
/// a second time.
///
/// Split rules:
/// - parameters are separated by `&`
/// - name and value are separated by the first `=`
/// - a token without `=` contributes nothing
/// - a repeated name keeps the last value
///
/// # Examples
/// ```
/// use bare_http::query::Query;
/// use std::collections::HashMap;
///
/// let mut params = HashMap::new();
/// Query::parse_into(&mut params, "test=test&name=hans&debug");
///
/// assert_eq!(params.get("test").map(String::as_str), Some("test"));
/// assert_eq!(params.get("name").map(String::as_str), Some("hans"));
/// assert!(!params.contains_key("debug")); // no `=`, ignored
/// ```
pub struct Query;

impl Query {
    /// Splits `query` into `result`, overwriting existing entries on name
    /// collisions. A leading `?` is accepted and skipped.
    pub fn parse_into(result: &mut HashMap<String, String>, query: &str) {
        let data = query.strip_prefix('?').unwrap_or(query);

        for parameter in data.split('&') {
            let Some(index) = memchr(b'=', parameter.as_bytes()) else {
                continue;
            };

            result.insert(
                parameter[..index].to_owned(),
                parameter[index + 1..].to_owned(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> HashMap<String, String> {
        let mut result = HashMap::new();
        Query::parse_into(&mut result, query);
        result
    }

    #[test]
    fn basic() {
        for line in ["a=1&b=2", "?a=1&b=2"] {
            let params = parse(line);

            assert_eq!(params.len(), 2);
            assert_eq!(params["a"], "1");
            assert_eq!(params["b"], "2");
        }
    }

    #[test]
    fn tokens_without_equals_are_ignored() {
        let params = parse("flag&empty=&=val&&key=value");

        assert_eq!(params.len(), 3);
        assert_eq!(params["empty"], "");
        assert_eq!(params[""], "val");
        assert_eq!(params["key"], "value");
        assert!(!params.contains_key("flag"));
    }

    #[test]
    fn last_value_wins() {
        let params = parse("a=1&a=2&a=3");

        assert_eq!(params.len(), 1);
        assert_eq!(params["a"], "3");
    }

    #[test]
    fn value_keeps_later_equals() {
        let params = parse("very=long=value=with=equals");

        assert_eq!(params["very"], "long=value=with=equals");
    }

    #[test]
    fn empty_query() {
        assert!(parse("").is_empty());
        assert!(parse("?").is_empty());
    }
}
