// src/engine/peek.rs

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};

/// A stream whose first item has already been pulled for inspection.
///
/// Polling yields the buffered item first, then every item of the tail in
/// its original order. Nothing else is buffered.
pub struct Peeked<S: Stream> {
    head: Option<S::Item>,
    tail: S,
}

impl<S> Peeked<S>
where
    S: Stream + Unpin,
{
    /// Pull the first item of `stream` and hold on to it.
    pub async fn peek(mut stream: S) -> Self {
        let head = stream.next().await;
        Self { head, tail: stream }
    }

    /// The buffered first item, or `None` if the stream was empty or it has been yielded.
    pub fn first(&self) -> Option<&S::Item> {
        self.head.as_ref()
    }
}

impl<S> Stream for Peeked<S>
where
    S: Stream + Unpin,
    S::Item: Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(item) = self.head.take() {
            return Poll::Ready(Some(item));
        }
        self.tail.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let extra = usize::from(self.head.is_some());
        let (low, high) = self.tail.size_hint();
        (
            low.saturating_add(extra),
            high.and_then(|h| h.checked_add(extra)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_merge_reproduces_original_order() {
        for len in 1..8 {
            let original: Vec<u32> = (0..len).collect();
            let peeked = Peeked::peek(stream::iter(original.clone())).await;

            assert_eq!(peeked.first(), Some(&0));
            let merged: Vec<u32> = peeked.collect().await;
            assert_eq!(merged, original);
        }
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let peeked = Peeked::peek(stream::iter(Vec::<u32>::new())).await;
        assert!(peeked.first().is_none());
        assert!(peeked.collect::<Vec<_>>().await.is_empty());
    }

    #[tokio::test]
    async fn test_tail_is_not_polled_during_peek() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<&str>();
        tx.unbounded_send("first").unwrap();

        let mut peeked = Peeked::peek(rx).await;
        assert_eq!(peeked.first(), Some(&"first"));

        // Items arriving after the peek still follow the head.
        tx.unbounded_send("second").unwrap();
        drop(tx);
        assert_eq!(peeked.next().await, Some("first"));
        assert_eq!(peeked.next().await, Some("second"));
        assert_eq!(peeked.next().await, None);
    }

    #[tokio::test]
    async fn test_size_hint_counts_head() {
        let peeked = Peeked::peek(stream::iter(vec![1, 2, 3])).await;
        assert_eq!(peeked.size_hint(), (3, Some(3)));
    }
}
