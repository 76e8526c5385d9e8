//! Deduplicating work queue between planning and processing.
//!
//! Many pages can embed the same image with the same options. Each embed
//! produces a plan, but every derivative must be encoded only once per build.
//! The queue is keyed by [`QueueKey`] `(destination path, cache key)`, so
//! re-enqueuing an equivalent derivative is a no-op.
//!
//! The build driver fills the queue while planning, then calls [`drain`] once
//! and hands the items to the worker pool. Nothing is enqueued concurrently
//! with draining.
//!
//! [`drain`]: DerivativeQueue::drain

use crate::options::TransformOptions;
use crate::types::{DerivativeSpec, PlanResult, QueueItem, QueueKey, SourceImage};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct DerivativeQueue {
    items: BTreeMap<QueueKey, QueueItem>,
    cache_dir: Option<PathBuf>,
}

impl DerivativeQueue {
    /// `cache_dir`: where cache entries live, `None` to process without a cache.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            items: BTreeMap::new(),
            cache_dir,
        }
    }

    /// Queue one derivative. Returns `false` when an item with the same
    /// destination and cache key is already queued.
    ///
    /// `options` are the request options; width and height are overridden
    /// with the derivative's own.
    pub fn enqueue(
        &mut self,
        source: &SourceImage,
        spec: &DerivativeSpec,
        options: &TransformOptions,
    ) -> bool {
        let key = QueueKey {
            dest_path: spec.dest_path.clone(),
            cache_key: spec.cache_key.clone(),
        };
        if self.items.contains_key(&key) {
            return false;
        }
        let item = QueueItem {
            spec: spec.clone(),
            source: source.clone(),
            options: options.for_derivative(spec.width, spec.height),
            cache_path: self.cache_dir.as_ref().map(|d| d.join(&spec.file_name)),
        };
        self.items.insert(key, item);
        true
    }

    /// Queue every derivative of a plan. Returns how many were new.
    ///
    /// On-demand plans are never queued: their derivatives are rendered when
    /// requested.
    pub fn enqueue_plan(&mut self, plan: &PlanResult) -> usize {
        if plan.on_demand {
            return 0;
        }
        plan.derivatives
            .iter()
            .filter(|spec| self.enqueue(&plan.source, spec, &plan.options))
            .count()
    }

    /// Take every queued item, ordered by destination path.
    pub fn drain(&mut self) -> Vec<QueueItem> {
        std::mem::take(&mut self.items).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Dimensions, OutputFormat};

    fn source() -> SourceImage {
        SourceImage {
            path: PathBuf::from("/site/a.jpg"),
            rel_path: "a.jpg".into(),
            content_hash: "abc".into(),
            width: 1200,
            height: 800,
            orientation: 1,
            format: OutputFormat::Jpeg,
            name: "a".into(),
            ext: "jpg".into(),
        }
    }

    fn spec(width: u32, key: &str) -> DerivativeSpec {
        let file_name = format!("a.{key}{width}.abc.jpg");
        DerivativeSpec {
            width,
            height: None,
            dest_path: PathBuf::from("/site/dist/img").join(&file_name),
            src: format!("/img/{file_name}"),
            file_name,
            modern_src: None,
            cache_key: key.to_string(),
        }
    }

    fn plan(widths: &[u32], on_demand: bool) -> PlanResult {
        PlanResult {
            source: source(),
            options: TransformOptions::default(),
            cache_key: "k1".into(),
            size: Dimensions {
                width: 1200,
                height: 800,
            },
            derivatives: widths.iter().map(|&w| spec(w, "k1")).collect(),
            src: String::new(),
            srcset: vec![],
            sizes: None,
            placeholder: None,
            sources: vec![],
            class_names: vec![],
            lazy: true,
            alt: None,
            on_demand,
        }
    }

    #[test]
    fn enqueue_twice_keeps_one_item() {
        let mut queue = DerivativeQueue::new(None);
        let s = spec(480, "k1");
        assert!(queue.enqueue(&source(), &s, &TransformOptions::default()));
        assert!(!queue.enqueue(&source(), &s, &TransformOptions::default()));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn same_destination_different_key_are_distinct() {
        let mut queue = DerivativeQueue::new(None);
        let a = spec(480, "k1");
        let mut b = a.clone();
        b.cache_key = "k2".into();
        queue.enqueue(&source(), &a, &TransformOptions::default());
        queue.enqueue(&source(), &b, &TransformOptions::default());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn item_options_carry_derivative_size() {
        let mut queue = DerivativeQueue::new(None);
        let options = TransformOptions {
            width: Some(1200),
            quality: Some(50),
            ..Default::default()
        };
        queue.enqueue(&source(), &spec(480, "k1"), &options);
        let item = queue.drain().remove(0);
        assert_eq!(item.options.width, Some(480));
        assert_eq!(item.options.height, None);
        assert_eq!(item.options.quality, Some(50));
    }

    #[test]
    fn cache_path_mirrors_file_name() {
        let mut queue = DerivativeQueue::new(Some(PathBuf::from("/cache")));
        let s = spec(480, "k1");
        queue.enqueue(&source(), &s, &TransformOptions::default());
        let item = queue.drain().remove(0);
        assert_eq!(item.cache_path, Some(PathBuf::from("/cache").join(&s.file_name)));
        assert_eq!(item.key().cache_key, "k1");
    }

    #[test]
    fn no_cache_dir_means_no_cache_path() {
        let mut queue = DerivativeQueue::new(None);
        queue.enqueue(&source(), &spec(480, "k1"), &TransformOptions::default());
        assert_eq!(queue.drain()[0].cache_path, None);
    }

    #[test]
    fn enqueue_plan_dedups_across_plans() {
        let mut queue = DerivativeQueue::new(None);
        assert_eq!(queue.enqueue_plan(&plan(&[480, 1200], false)), 2);
        assert_eq!(queue.enqueue_plan(&plan(&[480, 1200], false)), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn on_demand_plans_are_not_queued() {
        let mut queue = DerivativeQueue::new(None);
        assert_eq!(queue.enqueue_plan(&plan(&[480, 1200], true)), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_empties_and_sorts() {
        let mut queue = DerivativeQueue::new(None);
        queue.enqueue(&source(), &spec(1200, "k1"), &TransformOptions::default());
        queue.enqueue(&source(), &spec(480, "k1"), &TransformOptions::default());
        let items = queue.drain();
        assert!(queue.is_empty());
        let paths: Vec<_> = items.iter().map(|i| i.spec.dest_path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
        assert!(queue.drain().is_empty());
    }
}
