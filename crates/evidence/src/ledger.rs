use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::normalize::{
    dedupe_key, format_evidence_id, normalize_optional, normalize_tags, normalize_text,
    parse_evidence_number, union_tags, MAX_FINDING_CHARS, MAX_SOURCE_CHARS, MAX_WHY_CHARS,
};

pub const DEFAULT_MAX_ITEMS: usize = 50;
pub const MAX_MAX_ITEMS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceLedgerOptions {
    pub max_items: usize,
}

impl Default for EvidenceLedgerOptions {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// One fact as submitted by the reasoning loop, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceLedgerInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub finding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_it_matters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl EvidenceLedgerInput {
    pub fn new(source: impl Into<String>, finding: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            finding: finding.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLedgerItem {
    pub id: String,
    pub source: String,
    pub finding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_it_matters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceLedgerAddResult {
    pub added_ids: Vec<String>,
    pub updated_ids: Vec<String>,
    /// Surviving ids that absorbed (or blocked) a duplicate submission.
    pub ignored_duplicate_ids: Vec<String>,
    pub invalid_count: usize,
    pub at_capacity_count: usize,
}

struct NormalizedInput {
    source: String,
    finding: String,
    why_it_matters: Option<String>,
    tags: Option<Vec<String>>,
    dedupe_key: String,
}

/// Bounded, deduplicated store of facts cited by id (`E1`, `E2`, ...).
///
/// Not internally synchronized: wrap it in a lock if several tasks share one.
pub struct EvidenceLedger {
    max_items: usize,
    // `None` once the id space is used up.
    next_id: Option<u64>,
    items: HashMap<String, EvidenceLedgerItem>,
    // dedupe key -> canonical id; always in lockstep with `items`.
    by_dedupe_key: HashMap<String, String>,
}

impl Default for EvidenceLedger {
    fn default() -> Self {
        Self::new(EvidenceLedgerOptions::default())
    }
}

impl EvidenceLedger {
    pub fn new(options: EvidenceLedgerOptions) -> Self {
        Self {
            max_items: options.max_items.clamp(1, MAX_MAX_ITEMS),
            next_id: Some(1),
            items: HashMap::new(),
            by_dedupe_key: HashMap::new(),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_evidence_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceLedgerItem> {
        let number = parse_evidence_number(id)?;
        self.items.get(&format_evidence_id(number))
    }

    /// Snapshot ordered by numeric id.
    pub fn items(&self) -> Vec<EvidenceLedgerItem> {
        let mut items: Vec<EvidenceLedgerItem> = self.items.values().cloned().collect();
        items.sort_by_key(|item| parse_evidence_number(&item.id).unwrap_or(u64::MAX));
        items
    }

    /// Applies a batch in submission order; later items observe earlier ones.
    pub fn add_or_update(&mut self, batch: &[EvidenceLedgerInput]) -> EvidenceLedgerAddResult {
        let mut outcome = EvidenceLedgerAddResult::default();
        for input in batch {
            self.apply_one(input, &mut outcome);
        }
        log::debug!(
            "evidence batch: added={} updated={} duplicates={} invalid={} at_capacity={} total={}",
            outcome.added_ids.len(),
            outcome.updated_ids.len(),
            outcome.ignored_duplicate_ids.len(),
            outcome.invalid_count,
            outcome.at_capacity_count,
            self.items.len()
        );
        outcome
    }

    fn apply_one(&mut self, input: &EvidenceLedgerInput, outcome: &mut EvidenceLedgerAddResult) {
        let Some(normalized) = normalize_input(input) else {
            outcome.invalid_count += 1;
            return;
        };
        let owner = self.by_dedupe_key.get(&normalized.dedupe_key).cloned();

        match input.id.as_deref().and_then(parse_evidence_number) {
            Some(number) => {
                let id = format_evidence_id(number);
                if let Some(other) = owner.filter(|owner| owner != &id) {
                    outcome.ignored_duplicate_ids.push(other);
                    return;
                }
                if self.items.contains_key(&id) {
                    self.merge_into(&id, normalized);
                    outcome.updated_ids.push(id);
                    return;
                }
                if self.items.len() >= self.max_items {
                    outcome.at_capacity_count += 1;
                    return;
                }
                self.insert(id.clone(), normalized);
                if self.next_id.is_some_and(|next| number >= next) {
                    self.next_id = number.checked_add(1);
                }
                outcome.added_ids.push(id);
            }
            None => {
                if let Some(existing) = owner {
                    self.merge_into(&existing, normalized);
                    outcome.ignored_duplicate_ids.push(existing);
                    return;
                }
                if self.items.len() >= self.max_items {
                    outcome.at_capacity_count += 1;
                    return;
                }
                let Some(id) = self.allocate_id() else {
                    outcome.at_capacity_count += 1;
                    return;
                };
                self.insert(id.clone(), normalized);
                outcome.added_ids.push(id);
            }
        }
    }

    fn allocate_id(&mut self) -> Option<String> {
        loop {
            let number = self.next_id?;
            self.next_id = number.checked_add(1);
            let id = format_evidence_id(number);
            if !self.items.contains_key(&id) {
                return Some(id);
            }
        }
    }

    fn insert(&mut self, id: String, normalized: NormalizedInput) {
        self.by_dedupe_key
            .insert(normalized.dedupe_key, id.clone());
        self.items.insert(
            id.clone(),
            EvidenceLedgerItem {
                id,
                source: normalized.source,
                finding: normalized.finding,
                why_it_matters: normalized.why_it_matters,
                tags: normalized.tags,
            },
        );
    }

    fn merge_into(&mut self, id: &str, normalized: NormalizedInput) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        item.source = normalized.source;
        item.finding = normalized.finding;
        if normalized.why_it_matters.is_some() {
            item.why_it_matters = normalized.why_it_matters;
        }
        item.tags = union_tags(item.tags.take(), normalized.tags);

        // The item's identity may have changed; drop every key still pointing at it.
        self.by_dedupe_key.retain(|_, owner| owner != id);
        self.by_dedupe_key
            .insert(normalized.dedupe_key, id.to_string());
    }
}

fn normalize_input(input: &EvidenceLedgerInput) -> Option<NormalizedInput> {
    let source = normalize_text(&input.source, MAX_SOURCE_CHARS)?;
    let finding = normalize_text(&input.finding, MAX_FINDING_CHARS)?;
    let dedupe_key = dedupe_key(&source, &finding);
    Some(NormalizedInput {
        why_it_matters: normalize_optional(input.why_it_matters.as_deref(), MAX_WHY_CHARS),
        tags: normalize_tags(input.tags.as_deref()),
        source,
        finding,
        dedupe_key,
    })
}
