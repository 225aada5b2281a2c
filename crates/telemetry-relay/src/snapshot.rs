// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Point-in-time metric trees and their flattening into topic paths.

use std::fmt;

use derive_more::{Display, Into};

use crate::constants::TOPIC_SEPARATOR;

/// A leaf value of a metrics tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Debug keeps the trailing `.0` on whole numbers
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Self::from(v as u64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetricsNode {
    Scalar(Scalar),
    Group(MetricsSnapshot),
}

macro_rules! scalar_node_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for MetricsNode {
                fn from(v: $ty) -> Self {
                    Self::Scalar(v.into())
                }
            }
        )*
    };
}

scalar_node_from!(Scalar, i64, u64, usize, f64, f32, bool, &str, String);

impl From<MetricsSnapshot> for MetricsNode {
    fn from(group: MetricsSnapshot) -> Self {
        Self::Group(group)
    }
}

/// A named group of metric nodes. Iteration follows insertion order, so two traversals
/// of the same snapshot always visit keys identically.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    entries: Vec<(String, MetricsNode)>,
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node` under `key`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<MetricsNode>) {
        let key = key.into();
        let node = node.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = node,
            None => self.entries.push((key, node)),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, node: impl Into<MetricsNode>) -> Self {
        self.insert(key, node);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetricsNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth-first, pre-order `(path, value)` pairs.
    pub fn flatten(&self) -> Flatten<'_> {
        Flatten {
            stack: vec![(String::new(), self.entries.iter())],
        }
    }

    /// The paths of [`Self::flatten`], from the same traversal.
    pub fn topic_paths(&self) -> impl Iterator<Item = TopicPath> + '_ {
        self.flatten().map(|(path, _)| path)
    }
}

/// A leaf's ancestor keys joined with `/`, usable as a topic name.
#[derive(Clone, Debug, Display, Into, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPath(String);

impl TopicPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TopicPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub struct Flatten<'a> {
    stack: Vec<(String, std::slice::Iter<'a, (String, MetricsNode)>)>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = (TopicPath, &'a Scalar);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, entries) = self.stack.last_mut()?;
            let Some((key, node)) = entries.next() else {
                self.stack.pop();
                continue;
            };

            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}{TOPIC_SEPARATOR}{key}")
            };
            match node {
                MetricsNode::Scalar(value) => return Some((TopicPath(path), value)),
                MetricsNode::Group(group) => self.stack.push((path, group.entries.iter())),
            }
        }
    }
}

/// Source of metric snapshots, sampled once per publishing tick.
pub trait MetricsSampler: Send {
    fn sample(&mut self) -> MetricsSnapshot;
}
