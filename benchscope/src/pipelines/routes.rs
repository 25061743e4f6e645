//! Route-list hints for access-log aggregation.
//!
//! Log aggregators count every distinct URL separately unless told which
//! paths belong together. This collapses the application's parameterized
//! routes into regular expressions so `/users/1` and `/users/2` aggregate
//! under `/users/.+`.

/// Wildcard substituted for a dynamic segment.
const WILDCARD: &str = ".+";

/// Collapse dynamic segments (`:id`, `{id}`) to a wildcard and comma-join.
///
/// Static routes pass through unchanged, order is preserved, and catch-all
/// segments (`*`, `{*rest}`) are left alone.
///
/// ```
/// use benchscope::pipelines::routes::collapse_routes;
/// assert_eq!(collapse_routes(&["/hoge/:id", "/hoge/piyo"]), "/hoge/.+,/hoge/piyo");
/// ```
#[must_use]
pub fn collapse_routes<S: AsRef<str>>(routes: &[S]) -> String {
    routes.iter().map(|r| collapse_route(r.as_ref())).collect::<Vec<_>>().join(",")
}

fn collapse_route(route: &str) -> String {
    route
        .split('/')
        .map(|segment| if is_dynamic(segment) { WILDCARD } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_dynamic(segment: &str) -> bool {
    (segment.len() > 1 && segment.starts_with(':'))
        || (segment.len() > 2
            && segment.starts_with('{')
            && segment.ends_with('}')
            && !segment.starts_with("{*"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_routes() {
        let cases: &[(&str, &[&str], &str)] = &[
            ("empty", &[], ""),
            ("simple routes", &["/hoge/fuga"], "/hoge/fuga"),
            ("multiple routes", &["/hoge/fuga", "/hoge/piyo"], "/hoge/fuga,/hoge/piyo"),
            ("variables", &["/hoge/:id", "/hoge/piyo"], "/hoge/.+,/hoge/piyo"),
            ("variables 2", &["/hoge/:id/fuga", "/hoge/piyo"], "/hoge/.+/fuga,/hoge/piyo"),
            ("asterisk", &["/hoge/*", "/hoge/piyo"], "/hoge/*,/hoge/piyo"),
        ];
        for (name, input, expect) in cases {
            assert_eq!(collapse_routes(input), *expect, "case {name}");
        }
    }

    #[test]
    fn test_collapse_multiple_dynamic_segments() {
        assert_eq!(collapse_routes(&["/users/:id/posts/:post"]), "/users/.+/posts/.+");
    }

    #[test]
    fn test_collapse_brace_style_segments() {
        assert_eq!(
            collapse_routes(&["/metrics/{name}", "/files/{*path}"]),
            "/metrics/.+,/files/{*path}"
        );
    }

    #[test]
    fn test_colon_inside_segment_is_static() {
        assert_eq!(collapse_routes(&["/a:b/c", "/"]), "/a:b/c,/");
    }
}
