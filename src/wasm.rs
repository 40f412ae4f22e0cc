use wasm_bindgen::prelude::*;

/// Block graph JSON for `source`. `names_json` may be empty.
#[wasm_bindgen]
pub fn compile_pseudocode(source: &str, names_json: &str) -> Result<String, JsValue> {
    crate::compile_source_to_json(source, Some(names_json))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn compile_pseudocode_to_sb3(source: &str, names_json: &str) -> Result<String, JsValue> {
    crate::compile_source_to_sb3_json(source, Some(names_json))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
