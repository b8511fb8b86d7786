// Copyright 2016 Pierre-Étienne Meunier
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The optional stat cache: a trie mirroring the observed remote namespace,
//! keyed by path component, each node carrying the `stat`/`lstat` records
//! last observed for it and (once populated by a directory listing) the
//! names of its children. Every mutating operation invalidates the affected
//! prefix so a stale entry is never served.

use std::collections::HashMap;

use crate::attrs::FileAttributes;

#[derive(Default)]
struct Node {
	stat: Option<FileAttributes>,
	lstat: Option<FileAttributes>,
	children: Option<Vec<String>>,
	entries: HashMap<String, Node>,
}

/// `false` until [`StatCache::enable`] is called; a disabled cache answers
/// every lookup with a miss and `put`/`record_listing` become no-ops, so
/// callers can leave the cache wired in and flip it on only when wanted.
pub struct StatCache {
	enabled: bool,
	root: Node,
}

fn components(path: &str) -> Vec<&str> {
	path.split('/').filter(|c| !c.is_empty()).collect()
}

impl StatCache {
	pub fn new() -> Self {
		StatCache { enabled: false, root: Node::default() }
	}

	pub fn enable(&mut self) {
		self.enabled = true;
	}

	pub fn disable(&mut self) {
		self.enabled = false;
	}

	pub fn clear(&mut self) {
		self.root = Node::default();
	}

	fn node_mut(&mut self, path: &str) -> &mut Node {
		let mut node = &mut self.root;
		for part in components(path) {
			node = node.entries.entry(part.to_string()).or_default();
		}
		node
	}

	fn node(&self, path: &str) -> Option<&Node> {
		let mut node = &self.root;
		for part in components(path) {
			node = node.entries.get(part)?;
		}
		Some(node)
	}

	pub fn stat(&self, path: &str) -> Option<&FileAttributes> {
		if !self.enabled {
			return None;
		}
		self.node(path)?.stat.as_ref()
	}

	pub fn lstat(&self, path: &str) -> Option<&FileAttributes> {
		if !self.enabled {
			return None;
		}
		self.node(path)?.lstat.as_ref()
	}

	pub fn children(&self, path: &str) -> Option<&[String]> {
		if !self.enabled {
			return None;
		}
		self.node(path)?.children.as_deref()
	}

	pub fn put_stat(&mut self, path: &str, attrs: FileAttributes) {
		if !self.enabled {
			return;
		}
		self.node_mut(path).stat = Some(attrs);
	}

	pub fn put_lstat(&mut self, path: &str, attrs: FileAttributes) {
		if !self.enabled {
			return;
		}
		self.node_mut(path).lstat = Some(attrs);
	}

	/// Populates a directory's children from a `readdir` listing (`nlist`/
	/// `rawlist` in spec.md's vocabulary), also seeding each child's own
	/// `lstat` since `SSH_FXP_NAME` carries one attributes record per entry.
	pub fn record_listing(&mut self, dir: &str, entries: &[(String, FileAttributes)]) {
		if !self.enabled {
			return;
		}
		let names: Vec<String> = entries.iter().map(|(name, _)| name.clone()).collect();
		for (name, attrs) in entries {
			let child_path = if dir.is_empty() || dir == "/" { format!("/{}", name) } else { format!("{}/{}", dir, name) };
			self.node_mut(&child_path).lstat = Some(attrs.clone());
		}
		self.node_mut(dir).children = Some(names);
	}

	/// Invalidates everything known about `path` and, since a rename/delete/
	/// mkdir also changes what its parent directory lists, the parent's
	/// cached children too.
	pub fn invalidate(&mut self, path: &str) {
		if !self.enabled {
			return;
		}
		let parts = components(path);
		if parts.is_empty() {
			self.root = Node::default();
			return;
		}
		if let Some(parent_node) = self.parent_mut(&parts) {
			parent_node.children = None;
			parent_node.entries.remove(*parts.last().unwrap());
		}
	}

	fn parent_mut(&mut self, parts: &[&str]) -> Option<&mut Node> {
		let mut node = &mut self.root;
		for part in &parts[..parts.len() - 1] {
			node = node.entries.get_mut(*part)?;
		}
		Some(node)
	}
}

impl Default for StatCache {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn disabled_cache_never_answers() {
		let mut cache = StatCache::new();
		cache.put_stat("/a", FileAttributes::with_size(1));
		assert!(cache.stat("/a").is_none());
	}

	#[test]
	fn enabled_cache_round_trips_and_invalidates() {
		let mut cache = StatCache::new();
		cache.enable();
		cache.put_stat("/a/b", FileAttributes::with_size(1));
		assert_eq!(cache.stat("/a/b"), Some(&FileAttributes::with_size(1)));
		cache.invalidate("/a/b");
		assert_eq!(cache.stat("/a/b"), None);
	}

	#[test]
	fn listing_populates_children_and_their_lstat() {
		let mut cache = StatCache::new();
		cache.enable();
		cache.record_listing("/dir", &[("f.txt".to_string(), FileAttributes::with_size(3))]);
		assert_eq!(cache.children("/dir"), Some(&["f.txt".to_string()][..]));
		assert_eq!(cache.lstat("/dir/f.txt"), Some(&FileAttributes::with_size(3)));
	}
}
