use super::types::{
    self, is_singleton, nested_items_field, read_parameters, record_collection, record_id,
    GatePartsRecord, GateRecord, HillParameters, StructureRecord,
};
use super::LibraryDocument;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Items of one collection, in document order, with O(1) lookup by identifier.
#[derive(Debug, Default)]
pub struct ItemTable<'a> {
    items: Vec<&'a Value>,
    by_id: HashMap<&'a str, usize>,
}

impl<'a> ItemTable<'a> {
    fn push(&mut self, item: &'a Value) {
        let idx = self.items.len();
        self.items.push(item);

        let keys = [record_id(item), item.get("id").and_then(Value::as_str)];
        for key in keys.into_iter().flatten() {
            if let Some(&first) = self.by_id.get(key) {
                if first != idx {
                    warn!("Duplicate identifier '{}'; keeping the first record", key);
                }
                continue;
            }
            self.by_id.insert(key, idx);
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Value> {
        self.by_id.get(id).map(|&i| self.items[i])
    }

    pub fn items(&self) -> &[&'a Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
pub enum CollectionEntry<'a> {
    Singleton(&'a Value),
    Items(ItemTable<'a>),
}

/// How a promoter was tied to the gate it implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    /// A `gate_parts` record names the promoter.
    GateParts,
    /// A structure used by the gate lists the promoter among its outputs.
    Structure,
    /// The promoter is named `"p" + regulator`. Coincidental prefixes can match.
    RegulatorName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateLink {
    pub gate: String,
    pub source: LinkSource,
}

/// Read-only lookup structures over a [`LibraryDocument`]. Sibling-record and
/// array-field storage of the same collection index identically.
#[derive(Debug)]
pub struct LibraryIndex<'a> {
    collections: HashMap<&'a str, CollectionEntry<'a>>,
    order: Vec<&'a str>,
    promoter_links: HashMap<String, GateLink>,
}

static EMPTY: [&Value; 0] = [];

impl<'a> LibraryIndex<'a> {
    pub fn build(doc: &'a LibraryDocument) -> Self {
        let mut collections: HashMap<&'a str, CollectionEntry<'a>> = HashMap::new();
        let mut order = Vec::new();

        for record in doc.records() {
            let Some(name) = record_collection(record) else {
                debug!("Skipping record without a collection field");
                continue;
            };
            if !collections.contains_key(name) {
                order.push(name);
            }

            if is_singleton(name) {
                if collections.contains_key(name) {
                    warn!("Collection '{}' appears more than once; using the first", name);
                } else {
                    collections.insert(name, CollectionEntry::Singleton(record));
                }
                continue;
            }

            let entry = collections
                .entry(name)
                .or_insert_with(|| CollectionEntry::Items(ItemTable::default()));
            let CollectionEntry::Items(table) = entry else {
                continue;
            };
            match nested_items_field(record, name) {
                Some(field) => {
                    if let Some(Value::Array(items)) = record.get(field.as_str()) {
                        for item in items {
                            table.push(item);
                        }
                    }
                }
                None => table.push(record),
            }
        }

        let mut index = Self {
            collections,
            order,
            promoter_links: HashMap::new(),
        };
        index.promoter_links = index.derive_promoter_links();
        index
    }

    /// Collection names in first-seen document order.
    pub fn collections(&self) -> &[&'a str] {
        &self.order
    }

    pub fn entry(&self, collection: &str) -> Option<&CollectionEntry<'a>> {
        self.collections.get(collection)
    }

    pub fn singleton(&self, collection: &str) -> Option<&'a Value> {
        match self.collections.get(collection)? {
            CollectionEntry::Singleton(v) => Some(*v),
            CollectionEntry::Items(_) => None,
        }
    }

    pub fn items(&self, collection: &str) -> &[&'a Value] {
        match self.collections.get(collection) {
            Some(CollectionEntry::Items(table)) => table.items(),
            _ => &EMPTY,
        }
    }

    /// Looks up an item by `name` or `id`. Unknown collections or ids yield `None`.
    pub fn get(&self, collection: &str, id: &str) -> Option<&'a Value> {
        match self.collections.get(collection)? {
            CollectionEntry::Items(table) => table.get(id),
            CollectionEntry::Singleton(_) => None,
        }
    }

    /// Finds a part by name across every part-bearing collection.
    pub fn part(&self, name: &str) -> Option<&'a Value> {
        types::PART_COLLECTIONS
            .iter()
            .find_map(|c| self.get(c, name))
    }

    pub fn parts_by_type(&self, part_type: &str) -> Vec<&'a Value> {
        types::PART_COLLECTIONS
            .iter()
            .flat_map(|c| self.items(c).iter().copied())
            .filter(|p| p.get("type").and_then(Value::as_str) == Some(part_type))
            .collect()
    }

    pub fn gate(&self, name: &str) -> Option<&'a Value> {
        self.get(types::GATES, name)
    }

    pub fn gate_link(&self, promoter: &str) -> Option<&GateLink> {
        self.promoter_links.get(promoter)
    }

    pub fn promoters_for_gate(&self, gate: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .promoter_links
            .iter()
            .filter(|(_, link)| link.gate == gate)
            .map(|(p, _)| p.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn response_function(&self, gate: &str) -> Option<&'a Value> {
        self.items(types::RESPONSE_FUNCTIONS)
            .iter()
            .copied()
            .find(|rf| rf.get("gate_name").and_then(Value::as_str) == Some(gate))
    }

    /// Hill parameters for a gate: its response function, else the model it references.
    pub fn gate_parameters(&self, gate: &str) -> Option<HillParameters> {
        if let Some(params) = self
            .response_function(gate)
            .and_then(|rf| rf.get("parameters"))
            .map(read_parameters)
            .filter(|p| !p.is_empty())
        {
            return Some(params);
        }

        let model = self.gate_record(gate)?.model?;
        self.get(types::MODELS, &model)
            .and_then(|m| m.get("parameters"))
            .map(read_parameters)
            .filter(|p| !p.is_empty())
    }

    /// Merges the models of every gate whose structure outputs `promoter`,
    /// keeping the lowest `ymin`, the highest `ymax` and `K`, and the first
    /// value seen for anything else.
    pub fn promoter_parameters(&self, promoter: &str) -> HillParameters {
        let structures: Vec<String> = self
            .structures()
            .filter(|s| s.outputs.iter().any(|o| o == promoter))
            .map(|s| s.name)
            .collect();

        let mut merged = HillParameters::new();
        for gate in self.gates() {
            let uses_structure = gate
                .structure
                .as_ref()
                .map(|s| structures.contains(s))
                .unwrap_or(false);
            let Some(model) = gate.model.as_deref().filter(|_| uses_structure) else {
                continue;
            };
            let Some(params) = self
                .get(types::MODELS, model)
                .and_then(|m| m.get("parameters"))
                .map(read_parameters)
            else {
                continue;
            };

            for (name, value) in params {
                match merged.get(&name).copied() {
                    None => {
                        merged.insert(name, value);
                    }
                    Some(current) => {
                        let replace = match name.as_str() {
                            "ymin" => value < current,
                            "ymax" | "K" => value > current,
                            _ => false,
                        };
                        if replace {
                            merged.insert(name, value);
                        }
                    }
                }
            }
        }
        merged
    }

    fn gate_record(&self, gate: &str) -> Option<GateRecord> {
        self.gate(gate)
            .and_then(|g| serde_json::from_value::<GateRecord>((*g).clone()).ok())
    }

    fn gates(&self) -> impl Iterator<Item = GateRecord> + '_ {
        self.items(types::GATES)
            .iter()
            .filter_map(|g| serde_json::from_value::<GateRecord>((*g).clone()).ok())
    }

    fn structures(&self) -> impl Iterator<Item = StructureRecord> + '_ {
        self.items(types::STRUCTURES)
            .iter()
            .filter_map(|s| serde_json::from_value::<StructureRecord>((*s).clone()).ok())
    }

    fn derive_promoter_links(&self) -> HashMap<String, GateLink> {
        let mut links: HashMap<String, GateLink> = HashMap::new();

        for gp in self.items(types::GATE_PARTS) {
            let Ok(gp) = serde_json::from_value::<GatePartsRecord>((*gp).clone()) else {
                continue;
            };
            if let Some(promoter) = gp.promoter {
                links.entry(promoter).or_insert(GateLink {
                    gate: gp.gate_name,
                    source: LinkSource::GateParts,
                });
            }
        }

        let gates: Vec<GateRecord> = self.gates().collect();
        for structure in self.structures() {
            let Some(gate) = gates
                .iter()
                .find(|g| g.structure.as_deref() == Some(structure.name.as_str()))
                .and_then(|g| g.id())
            else {
                continue;
            };
            for promoter in structure.outputs {
                links.entry(promoter).or_insert_with(|| GateLink {
                    gate: gate.to_string(),
                    source: LinkSource::Structure,
                });
            }
        }

        for gate in &gates {
            let (Some(id), Some(regulator)) = (gate.id(), gate.regulator.as_deref()) else {
                continue;
            };
            let promoter = format!("p{}", regulator);
            if self.part(&promoter).is_some() {
                links.entry(promoter).or_insert_with(|| GateLink {
                    gate: id.to_string(),
                    source: LinkSource::RegulatorName,
                });
            }
        }

        links
    }
}
