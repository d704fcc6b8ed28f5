//! Cursor-following iteration over list endpoints.

use futures::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;

use crate::error::ScorableResult;

/// One page of a cursor-paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// The service reports `next` as a full URL; older deployments send the bare
/// cursor. Either way only the cursor value is needed for the next call.
pub fn extract_cursor(next: &str) -> Option<String> {
    let next = next.trim();
    if next.is_empty() {
        return None;
    }
    if let Ok(url) = url::Url::parse(next) {
        return url
            .query_pairs()
            .find(|(k, _)| k == "cursor")
            .map(|(_, v)| v.into_owned());
    }
    match next.split_once("cursor=") {
        Some((_, rest)) => Some(rest.split('&').next().unwrap_or(rest).to_string()),
        None => Some(next.to_string()),
    }
}

struct PageState<F, T> {
    fetch: F,
    cursor: Option<String>,
    remaining: usize,
    buffered: VecDeque<T>,
    exhausted: bool,
}

/// Stream at most `limit` items from a list endpoint.
///
/// `fetch(cursor, page_size)` is called with `page_size` set to the number of
/// items still wanted. Iteration ends on an empty page, a missing `next`
/// cursor, or once `limit` items were yielded. A fetch error is yielded once
/// and terminates the stream.
pub fn paginate<T, F, Fut>(fetch: F, limit: usize) -> impl Stream<Item = ScorableResult<T>>
where
    F: FnMut(Option<String>, usize) -> Fut,
    Fut: Future<Output = ScorableResult<Page<T>>>,
{
    let state = PageState {
        fetch,
        cursor: None,
        remaining: limit,
        buffered: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.remaining == 0 {
                return None;
            }
            if let Some(item) = st.buffered.pop_front() {
                st.remaining -= 1;
                return Some((Ok(item), st));
            }
            if st.exhausted {
                return None;
            }

            match (st.fetch)(st.cursor.take(), st.remaining).await {
                Ok(page) => {
                    if page.results.is_empty() {
                        return None;
                    }
                    st.cursor = page.next.as_deref().and_then(extract_cursor);
                    st.exhausted = st.cursor.is_none();
                    let take = st.remaining;
                    st.buffered.extend(page.results.into_iter().take(take));
                }
                Err(e) => {
                    st.remaining = 0;
                    return Some((Err(e), st));
                }
            }
        }
    })
}

/// Drain a paginated stream into a vector, stopping at the first error.
pub async fn collect_all<T, S>(stream: S) -> ScorableResult<Vec<T>>
where
    S: Stream<Item = ScorableResult<T>>,
{
    stream.try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScorableError;
    use std::cell::RefCell;

    #[test]
    fn test_extract_cursor_from_url() {
        assert_eq!(
            extract_cursor("https://api.scorable.ai/v1/judges/?cursor=cD0yMDI0&page_size=5"),
            Some("cD0yMDI0".to_string())
        );
        assert_eq!(extract_cursor("abc123"), Some("abc123".to_string()));
        assert_eq!(extract_cursor("cursor=xyz"), Some("xyz".to_string()));
        assert_eq!(extract_cursor(""), None);
        assert_eq!(extract_cursor("https://api.scorable.ai/v1/judges/"), None);
    }

    fn pages() -> Vec<Page<u32>> {
        vec![
            Page {
                results: vec![1, 2, 3],
                next: Some("https://x/v1/items/?cursor=p2".into()),
            },
            Page {
                results: vec![4, 5],
                next: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_follows_cursor_until_exhausted() {
        let calls = RefCell::new(Vec::new());
        let all = pages();
        let items = collect_all(paginate(
            |cursor, _size| {
                calls.borrow_mut().push(cursor.clone());
                let idx = if cursor.is_some() { 1 } else { 0 };
                let page = all[idx].clone();
                async move { Ok(page) }
            },
            100,
        ))
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(*calls.borrow(), vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn test_limit_stops_early_and_sizes_pages() {
        let sizes = RefCell::new(Vec::new());
        let all = pages();
        let items = collect_all(paginate(
            |cursor, size| {
                sizes.borrow_mut().push(size);
                let idx = if cursor.is_some() { 1 } else { 0 };
                let page = all[idx].clone();
                async move { Ok(page) }
            },
            4,
        ))
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4]);
        assert_eq!(*sizes.borrow(), vec![4, 1]);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let result: ScorableResult<Vec<u32>> = collect_all(paginate(
            |_cursor, _size| async {
                Err(ScorableError::RequestFailed {
                    status: 500,
                    body: "down".into(),
                })
            },
            10,
        ))
        .await;
        assert!(matches!(
            result,
            Err(ScorableError::RequestFailed { status: 500, .. })
        ));
    }
}
