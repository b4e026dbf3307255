#![forbid(unsafe_code)]
//! WASM-friendly bridge for the rich-text model.
//! Paths are passed as offset arrays, operations and attributes as JSON strings.

use richtext_core::{
    dev_utils, AttributeValue, Attributes, Committed, Diff, Document, Operation, Position, Range, ReplicaId,
    RootName, Target,
};
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, String> {
    let clean = hex.trim_start_matches("0x");
    if clean.len() % 2 != 0 {
        return Err("hex length must be even".into());
    }
    (0..clean.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&clean[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

fn to_js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn position(root: &str, path: Vec<u32>) -> Result<Position, JsValue> {
    Position::new(root, path.into_iter().map(|o| o as usize).collect()).map_err(to_js_err)
}

fn range(root: &str, start: Vec<u32>, end: Vec<u32>) -> Result<Range, JsValue> {
    Range::new(position(root, start)?, position(root, end)?).map_err(to_js_err)
}

fn parse_attributes(json: &str) -> Result<Attributes, JsValue> {
    if json.is_empty() {
        return Ok(Attributes::new());
    }
    serde_json::from_str(json).map_err(to_js_err)
}

/// Outcome of a change handed back to JS: the operations to broadcast and the view changes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsCommit<'a> {
    version: u64,
    operations: &'a [Operation],
    diff: &'a Diff,
}

fn commit_to_js<R>(doc: &Document, committed: &Committed<R>) -> Result<JsValue, JsValue> {
    let out = JsCommit {
        version: doc.version(),
        operations: committed.batch.operations(),
        diff: &committed.diff,
    };
    to_value(&out).map_err(to_js_err)
}

#[wasm_bindgen]
pub struct WasmEditor {
    inner: Document,
}

#[wasm_bindgen]
impl WasmEditor {
    #[wasm_bindgen(constructor)]
    pub fn new(replica_hex: String) -> WasmEditor {
        let replica_bytes = hex_to_bytes(&replica_hex).unwrap_or_else(|_| b"wasm".to_vec());
        WasmEditor {
            inner: Document::new(ReplicaId::new(replica_bytes)),
        }
    }

    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(replica_hex: String, json: String) -> Result<WasmEditor, JsValue> {
        let replica = ReplicaId::new(hex_to_bytes(&replica_hex).map_err(|e| JsValue::from_str(&e))?);
        let inner = Document::from_json(replica, &json).map_err(to_js_err)?;
        Ok(WasmEditor { inner })
    }

    #[wasm_bindgen(js_name = toJson)]
    pub fn to_json(&self) -> Result<String, JsValue> {
        self.inner.to_json_string().map_err(to_js_err)
    }

    pub fn version(&self) -> f64 {
        self.inner.version() as f64
    }

    #[wasm_bindgen(js_name = addRoot)]
    pub fn add_root(&mut self, root: String, element_name: String) -> Result<(), JsValue> {
        self.inner.add_root(root.as_str(), &element_name).map_err(to_js_err)
    }

    /// Root content in model notation.
    #[wasm_bindgen(js_name = getData)]
    pub fn get_data(&self, root: String) -> Result<String, JsValue> {
        dev_utils::stringify(&self.inner, &RootName::new(root)).map_err(to_js_err)
    }

    #[wasm_bindgen(js_name = setData)]
    pub fn set_data(&mut self, root: String, data: String) -> Result<(), JsValue> {
        dev_utils::set_data(&mut self.inner, &RootName::new(root), &data).map_err(to_js_err)
    }

    #[wasm_bindgen(js_name = insertText)]
    pub fn insert_text(
        &mut self,
        root: String,
        path: Vec<u32>,
        text: String,
        attributes_json: String,
    ) -> Result<JsValue, JsValue> {
        let at = position(&root, path)?;
        let attributes = parse_attributes(&attributes_json)?;
        let committed = self
            .inner
            .change(|w| w.insert_text(&text, attributes, &at))
            .map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    #[wasm_bindgen(js_name = insertElement)]
    pub fn insert_element(
        &mut self,
        root: String,
        path: Vec<u32>,
        name: String,
        attributes_json: String,
    ) -> Result<JsValue, JsValue> {
        let at = position(&root, path)?;
        let attributes = parse_attributes(&attributes_json)?;
        let committed = self
            .inner
            .change(|w| w.insert_element(&name, attributes, &at))
            .map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    pub fn remove(&mut self, root: String, start: Vec<u32>, end: Vec<u32>) -> Result<JsValue, JsValue> {
        let target = Target::Range(range(&root, start, end)?);
        let committed = self.inner.change(|w| w.remove(&target)).map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    /// Sets `key` over the range. An empty `value_json` removes the attribute.
    #[wasm_bindgen(js_name = setAttribute)]
    pub fn set_attribute(
        &mut self,
        root: String,
        start: Vec<u32>,
        end: Vec<u32>,
        key: String,
        value_json: String,
    ) -> Result<JsValue, JsValue> {
        let target = Target::Range(range(&root, start, end)?);
        let value: Option<AttributeValue> = if value_json.is_empty() {
            None
        } else {
            Some(serde_json::from_str(&value_json).map_err(to_js_err)?)
        };
        let committed = self
            .inner
            .change(|w| w.change_attribute(&key, value, &target))
            .map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    pub fn split(&mut self, root: String, path: Vec<u32>) -> Result<JsValue, JsValue> {
        let at = position(&root, path)?;
        let committed = self.inner.change(|w| w.split(&at)).map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    pub fn merge(&mut self, root: String, path: Vec<u32>) -> Result<JsValue, JsValue> {
        let at = position(&root, path)?;
        let committed = self.inner.change(|w| w.merge(&at)).map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    pub fn rename(&mut self, root: String, path: Vec<u32>, name: String) -> Result<JsValue, JsValue> {
        let at = position(&root, path)?;
        let committed = self.inner.change(|w| w.rename(&at, &name)).map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    #[wasm_bindgen(js_name = setMarker)]
    pub fn set_marker(
        &mut self,
        name: String,
        root: String,
        start: Vec<u32>,
        end: Vec<u32>,
    ) -> Result<JsValue, JsValue> {
        let marker_range = range(&root, start, end)?;
        let exists = self.inner.markers().get(&name).is_some();
        let committed = self
            .inner
            .change(|w| {
                if exists {
                    w.update_marker(&name, &marker_range)
                } else {
                    w.add_marker(&name, &marker_range, false)
                }
            })
            .map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    #[wasm_bindgen(js_name = removeMarker)]
    pub fn remove_marker(&mut self, name: String) -> Result<JsValue, JsValue> {
        let committed = self.inner.change(|w| w.remove_marker(&name)).map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    /// Applies a JSON array of operations produced by another replica.
    #[wasm_bindgen(js_name = applyRemote)]
    pub fn apply_remote(&mut self, ops_json: String) -> Result<JsValue, JsValue> {
        let ops: Vec<Operation> = serde_json::from_str(&ops_json).map_err(to_js_err)?;
        let committed = self.inner.apply_remote(&ops).map_err(to_js_err)?;
        commit_to_js(&self.inner, &committed)
    }

    /// Operations applied after `version`, as a JSON array.
    #[wasm_bindgen(js_name = opsSince)]
    pub fn ops_since(&self, version: f64) -> Result<String, JsValue> {
        let ops = self.inner.operations_since(version as u64).map_err(to_js_err)?;
        serde_json::to_string(&ops).map_err(to_js_err)
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.inner.can_redo()
    }

    /// Reverts the latest local batch. Returns `null` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<JsValue, JsValue> {
        match self.inner.undo().map_err(to_js_err)? {
            Some(committed) => commit_to_js(&self.inner, &committed),
            None => Ok(JsValue::NULL),
        }
    }

    pub fn redo(&mut self) -> Result<JsValue, JsValue> {
        match self.inner.redo().map_err(to_js_err)? {
            Some(committed) => commit_to_js(&self.inner, &committed),
            None => Ok(JsValue::NULL),
        }
    }
}
