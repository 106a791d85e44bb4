//! Thought-signature continuity cache (§4.6).
//!
//! Two-tier: an insertion-order-evicted in-memory L1 front, and a durable
//! JSON-file-backed store keyed by `tool_call_id`. `get` checks L1 first,
//! then the durable tier, populating L1 on a durable hit. `store` writes
//! through to both.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const L1_CAPACITY: usize = 1_000;
const DURABLE_CAPACITY: usize = 10_000;
const TTL: Duration = Duration::from_secs(60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// One cached signature/thought-text pair, keyed by `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedSignature {
	pub signature: Option<String>,
	pub thought_text: String,
	pub timestamp: u64,
}

fn now_secs() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[derive(Default, Serialize, Deserialize)]
struct DurableFile {
	entries: HashMap<String, CachedSignature>,
}

struct L1 {
	map: HashMap<String, CachedSignature>,
	order: VecDeque<String>,
}

impl L1 {
	fn new() -> Self {
		L1 { map: HashMap::new(), order: VecDeque::new() }
	}

	fn get(&self, id: &str) -> Option<CachedSignature> {
		self.map.get(id).cloned()
	}

	fn insert(&mut self, id: String, value: CachedSignature) {
		if !self.map.contains_key(&id) {
			self.order.push_back(id.clone());
		}
		self.map.insert(id, value);
		while self.order.len() > L1_CAPACITY {
			if let Some(oldest) = self.order.pop_front() {
				self.map.remove(&oldest);
			}
		}
	}

	fn clear(&mut self) {
		self.map.clear();
		self.order.clear();
	}
}

struct Durable {
	path: PathBuf,
	entries: HashMap<String, CachedSignature>,
}

impl Durable {
	fn open(path: PathBuf) -> Result<Self> {
		let entries = match std::fs::read_to_string(&path) {
			Ok(raw) => serde_json::from_str::<DurableFile>(&raw)?.entries,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
			Err(err) => return Err(Error::CacheIo(err)),
		};
		Ok(Durable { path, entries })
	}

	fn flush(&self) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = DurableFile { entries: self.entries.clone() };
		let serialized = serde_json::to_string_pretty(&file)?;
		let tmp_path = self.path.with_extension("json.tmp");
		std::fs::write(&tmp_path, serialized)?;
		std::fs::rename(&tmp_path, &self.path)?;
		Ok(())
	}

	fn insert(&mut self, id: String, value: CachedSignature) -> Result<()> {
		self.entries.insert(id, value);
		self.evict_if_over_capacity();
		self.flush()
	}

	fn evict_if_over_capacity(&mut self) {
		if self.entries.len() <= DURABLE_CAPACITY {
			return;
		}
		let mut by_age: Vec<(String, u64)> = self.entries.iter().map(|(k, v)| (k.clone(), v.timestamp)).collect();
		by_age.sort_by_key(|(_, ts)| *ts);
		let to_remove = self.entries.len() / 10;
		for (id, _) in by_age.into_iter().take(to_remove) {
			self.entries.remove(&id);
		}
	}

	/// Removes entries older than `TTL`. Returns the number removed.
	fn sweep(&mut self) -> usize {
		let now = now_secs();
		let before = self.entries.len();
		self.entries.retain(|_, v| now.saturating_sub(v.timestamp) <= TTL.as_secs());
		before - self.entries.len()
	}
}

/// The signature cache, injected as a dependency (typically `Arc<SignatureCache>`)
/// rather than referenced through a module-level singleton.
pub struct SignatureCache {
	l1: RwLock<L1>,
	durable: RwLock<Durable>,
}

impl SignatureCache {
	/// Opens (creating if absent) the durable store at `path` and runs one
	/// startup sweep.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let mut durable = Durable::open(path.as_ref().to_path_buf())?;
		let removed = durable.sweep();
		if removed > 0 {
			durable.flush()?;
		}
		Ok(SignatureCache { l1: RwLock::new(L1::new()), durable: RwLock::new(durable) })
	}

	/// Stores a signature, write-through to both tiers.
	pub fn store(&self, tool_call_id: impl Into<String>, signature: Option<String>, thought_text: impl Into<String>) -> Result<()> {
		let id = tool_call_id.into();
		let value = CachedSignature { signature, thought_text: thought_text.into(), timestamp: now_secs() };
		self.durable.write().unwrap().insert(id.clone(), value.clone())?;
		self.l1.write().unwrap().insert(id, value);
		Ok(())
	}

	/// Looks up a signature: L1 first, then the durable tier (populating L1 on hit).
	pub fn get(&self, tool_call_id: &str) -> Option<CachedSignature> {
		if let Some(hit) = self.l1.read().unwrap().get(tool_call_id) {
			return Some(hit);
		}
		let durable_hit = self.durable.read().unwrap().entries.get(tool_call_id).cloned();
		if let Some(ref value) = durable_hit {
			self.l1.write().unwrap().insert(tool_call_id.to_string(), value.clone());
		}
		durable_hit
	}

	pub fn has(&self, tool_call_id: &str) -> bool {
		self.get(tool_call_id).is_some()
	}

	/// Number of entries in the durable tier (the authoritative count).
	pub fn len(&self) -> usize {
		self.durable.read().unwrap().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		self.l1.write().unwrap().clear();
		self.durable.write().unwrap().entries.clear();
	}

	/// TTL sweep; returns the number of entries removed. Exposed directly so
	/// tests can drive it deterministically instead of waiting on the
	/// background timer.
	pub fn sweep_now(&self) -> Result<usize> {
		let mut durable = self.durable.write().unwrap();
		let removed = durable.sweep();
		if removed > 0 {
			durable.flush()?;
		}
		Ok(removed)
	}

	/// Teardown: flush the durable tier one last time. Callers holding the
	/// `JoinHandle` from [`Self::spawn_sweeper`] should abort it first; this
	/// only covers the store's own state, not the background task.
	pub fn shutdown(&self) -> Result<()> {
		self.durable.read().unwrap().flush()
	}

	/// Spawns the periodic background sweep (§4.6, every 10 minutes). The
	/// returned handle can be aborted to stop it (process teardown).
	pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
		let cache = Arc::clone(self);
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(SWEEP_INTERVAL);
			loop {
				interval.tick().await;
				match cache.sweep_now() {
					Ok(removed) if removed > 0 => tracing::debug!("signature cache sweep removed {removed} entries"),
					Ok(_) => {}
					Err(err) => tracing::warn!("signature cache sweep failed: {err:?}"),
				}
			}
		})
	}
}
