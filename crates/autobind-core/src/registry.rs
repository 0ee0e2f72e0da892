//! Binding registry
//!
//! Holds everything discovered for each module alias. Each logical table has
//! its own lock. Operations that touch several tables take the locks in the
//! order the fields are declared below and never in any other order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{CFunctionSignature, EnumData, EnumDef, SignatureOrigin, StructDef, Value};

type AliasMap<V> = HashMap<String, HashMap<String, V>>;

/// Owned per-alias binding tables
#[derive(Debug, Default)]
pub struct Registry {
    constants: RwLock<AliasMap<Value>>,
    macros: RwLock<AliasMap<String>>,
    macro_order: RwLock<HashMap<String, Vec<String>>>,
    macros_original: RwLock<AliasMap<String>>,
    typedefs: RwLock<AliasMap<String>>,
    func_ptr_sigs: RwLock<AliasMap<CFunctionSignature>>,
    structs: RwLock<HashMap<String, StructDef>>,
    enums: RwLock<HashMap<String, EnumDef>>,
    signatures: RwLock<AliasMap<CFunctionSignature>>,
    import_errors: RwLock<HashMap<String, Vec<String>>>,
}

/// Copy of everything one alias owns, as persisted in the cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasTables {
    pub constants: BTreeMap<String, Value>,
    pub macros: BTreeMap<String, String>,
    /// Macro names in declaration order
    #[serde(default)]
    pub macro_order: Vec<String>,
    pub macros_original: BTreeMap<String, String>,
    pub typedefs: BTreeMap<String, String>,
    pub func_ptr_sigs: BTreeMap<String, CFunctionSignature>,
    pub structs: Vec<StructDef>,
    pub enums: Vec<EnumData>,
    pub signatures: BTreeMap<String, CFunctionSignature>,
    pub import_errors: Vec<String>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn alias_copy<V: Clone>(map: &AliasMap<V>, alias: &str) -> BTreeMap<String, V> {
    map.get(alias)
        .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // Constants

    pub fn set_constant(&self, alias: &str, name: impl Into<String>, value: Value) {
        write(&self.constants)
            .entry(alias.to_string())
            .or_default()
            .insert(name.into(), value);
    }

    pub fn constant(&self, alias: &str, name: &str) -> Option<Value> {
        read(&self.constants).get(alias)?.get(name).cloned()
    }

    pub fn constants(&self, alias: &str) -> BTreeMap<String, Value> {
        alias_copy(&read(&self.constants), alias)
    }

    // Macros

    /// Record a macro's value text; returns `false` if the name was already taken
    pub fn record_macro(&self, alias: &str, name: impl Into<String>, value: impl Into<String>) -> bool {
        let mut macros = write(&self.macros);
        let table = macros.entry(alias.to_string()).or_default();
        let name = name.into();
        if table.contains_key(&name) {
            return false;
        }
        table.insert(name.clone(), value.into());
        write(&self.macro_order)
            .entry(alias.to_string())
            .or_default()
            .push(name);
        true
    }

    pub fn macro_value(&self, alias: &str, name: &str) -> Option<String> {
        read(&self.macros).get(alias)?.get(name).cloned()
    }

    pub fn macros(&self, alias: &str) -> BTreeMap<String, String> {
        alias_copy(&read(&self.macros), alias)
    }

    /// Recorded macros as `(name, value)` in the order they were declared
    pub fn macros_in_order(&self, alias: &str) -> Vec<(String, String)> {
        let macros = read(&self.macros);
        let order = read(&self.macro_order);
        let (Some(table), Some(names)) = (macros.get(alias), order.get(alias)) else {
            return Vec::new();
        };
        names
            .iter()
            .filter_map(|name| Some((name.clone(), table.get(name)?.clone())))
            .collect()
    }

    /// Record a macro's full definition text; the first definition is kept
    pub fn record_original_macro(&self, alias: &str, name: impl Into<String>, text: impl Into<String>) {
        write(&self.macros_original)
            .entry(alias.to_string())
            .or_default()
            .entry(name.into())
            .or_insert_with(|| text.into());
    }

    pub fn macros_original(&self, alias: &str) -> BTreeMap<String, String> {
        alias_copy(&read(&self.macros_original), alias)
    }

    // Typedefs

    pub fn set_typedef(&self, alias: &str, name: impl Into<String>, base: impl Into<String>) {
        write(&self.typedefs)
            .entry(alias.to_string())
            .or_default()
            .insert(name.into(), base.into());
    }

    pub fn typedef(&self, alias: &str, name: &str) -> Option<String> {
        read(&self.typedefs).get(alias)?.get(name).cloned()
    }

    pub fn typedefs(&self, alias: &str) -> BTreeMap<String, String> {
        alias_copy(&read(&self.typedefs), alias)
    }

    // Function pointer typedefs

    pub fn set_func_ptr_sig(&self, alias: &str, name: impl Into<String>, sig: CFunctionSignature) {
        write(&self.func_ptr_sigs)
            .entry(alias.to_string())
            .or_default()
            .insert(name.into(), sig);
    }

    pub fn func_ptr_sig(&self, alias: &str, name: &str) -> Option<CFunctionSignature> {
        read(&self.func_ptr_sigs).get(alias)?.get(name).cloned()
    }

    pub fn func_ptr_sigs(&self, alias: &str) -> BTreeMap<String, CFunctionSignature> {
        alias_copy(&read(&self.func_ptr_sigs), alias)
    }

    // Structs

    pub fn add_struct(&self, def: StructDef) {
        write(&self.structs).insert(def.name.clone(), def);
    }

    pub fn struct_def(&self, name: &str) -> Option<StructDef> {
        read(&self.structs).get(name).cloned()
    }

    // Enums

    pub fn add_enum(&self, def: EnumDef) {
        write(&self.enums).insert(def.name().to_string(), def);
    }

    /// Look up by namespaced name (`alias::Name`)
    pub fn enum_def(&self, full_name: &str) -> Option<EnumDef> {
        read(&self.enums).get(full_name).cloned()
    }

    pub fn enums_in(&self, namespace: &str) -> Vec<EnumDef> {
        let mut defs: Vec<EnumDef> = read(&self.enums)
            .values()
            .filter(|e| e.namespace() == namespace)
            .cloned()
            .collect();
        defs.sort_by(|a, b| a.name().cmp(b.name()));
        defs
    }

    // Signatures

    /// Register a discovered signature unless a manual one already exists
    ///
    /// Returns whether the signature was stored.
    pub fn register_signature(&self, alias: &str, sig: CFunctionSignature) -> bool {
        let mut signatures = write(&self.signatures);
        let table = signatures.entry(alias.to_string()).or_default();
        if let Some(existing) = table.get(&sig.name) {
            if existing.origin == SignatureOrigin::Manual && sig.origin != SignatureOrigin::Manual {
                return false;
            }
        }
        table.insert(sig.name.clone(), sig);
        true
    }

    /// Declare a signature by hand; always replaces what was discovered
    pub fn declare_function(&self, alias: &str, mut sig: CFunctionSignature) {
        sig.origin = SignatureOrigin::Manual;
        write(&self.signatures)
            .entry(alias.to_string())
            .or_default()
            .insert(sig.name.clone(), sig);
    }

    pub fn signature(&self, alias: &str, name: &str) -> Option<CFunctionSignature> {
        read(&self.signatures).get(alias)?.get(name).cloned()
    }

    pub fn signatures(&self, alias: &str) -> BTreeMap<String, CFunctionSignature> {
        alias_copy(&read(&self.signatures), alias)
    }

    // Auto-import error log

    pub fn push_import_error(&self, alias: &str, message: impl Into<String>) {
        write(&self.import_errors)
            .entry(alias.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn import_errors(&self, alias: &str) -> Vec<String> {
        read(&self.import_errors).get(alias).cloned().unwrap_or_default()
    }

    /// Forget everything discovered for `alias`
    ///
    /// Manual signatures survive so a reload keeps the caller's declarations.
    pub fn clear_alias(&self, alias: &str) {
        let mut constants = write(&self.constants);
        let mut macros = write(&self.macros);
        let mut macro_order = write(&self.macro_order);
        let mut macros_original = write(&self.macros_original);
        let mut typedefs = write(&self.typedefs);
        let mut func_ptr_sigs = write(&self.func_ptr_sigs);
        let mut structs = write(&self.structs);
        let mut enums = write(&self.enums);
        let mut signatures = write(&self.signatures);
        let mut import_errors = write(&self.import_errors);

        constants.remove(alias);
        macros.remove(alias);
        macro_order.remove(alias);
        macros_original.remove(alias);
        typedefs.remove(alias);
        func_ptr_sigs.remove(alias);
        structs.retain(|_, def| def.origin_alias != alias);
        enums.retain(|_, def| def.namespace() != alias);
        if let Some(table) = signatures.get_mut(alias) {
            table.retain(|_, sig| sig.origin == SignatureOrigin::Manual);
        }
        import_errors.remove(alias);
    }

    /// Copy every table entry owned by `alias`
    ///
    /// Structs are selected by their origin alias and enums by namespace, so
    /// nothing discovered for another alias leaks into the copy.
    pub fn snapshot_alias(&self, alias: &str) -> AliasTables {
        let constants = read(&self.constants);
        let macros = read(&self.macros);
        let macro_order = read(&self.macro_order);
        let macros_original = read(&self.macros_original);
        let typedefs = read(&self.typedefs);
        let func_ptr_sigs = read(&self.func_ptr_sigs);
        let structs = read(&self.structs);
        let enums = read(&self.enums);
        let signatures = read(&self.signatures);
        let import_errors = read(&self.import_errors);

        let mut struct_list: Vec<StructDef> = structs
            .values()
            .filter(|s| s.origin_alias == alias)
            .cloned()
            .collect();
        struct_list.sort_by(|a, b| a.name.cmp(&b.name));

        let mut enum_list: Vec<EnumData> = enums
            .values()
            .filter(|e| e.namespace() == alias)
            .map(EnumData::from)
            .collect();
        enum_list.sort_by(|a, b| a.name.cmp(&b.name));

        AliasTables {
            constants: alias_copy(&constants, alias),
            macros: alias_copy(&macros, alias),
            macro_order: macro_order.get(alias).cloned().unwrap_or_default(),
            macros_original: alias_copy(&macros_original, alias),
            typedefs: alias_copy(&typedefs, alias),
            func_ptr_sigs: alias_copy(&func_ptr_sigs, alias),
            structs: struct_list,
            enums: enum_list,
            signatures: alias_copy(&signatures, alias),
            import_errors: import_errors.get(alias).cloned().unwrap_or_default(),
        }
    }

    /// Merge a cached copy back into the live tables
    ///
    /// A live manual signature is never replaced by a cached one. The
    /// alias's import-error log is replaced, not extended.
    pub fn restore_alias(&self, alias: &str, tables: AliasTables) {
        let mut constants = write(&self.constants);
        let mut macros = write(&self.macros);
        let mut macro_order = write(&self.macro_order);
        let mut macros_original = write(&self.macros_original);
        let mut typedefs = write(&self.typedefs);
        let mut func_ptr_sigs = write(&self.func_ptr_sigs);
        let mut structs = write(&self.structs);
        let mut enums = write(&self.enums);
        let mut signatures = write(&self.signatures);
        let mut import_errors = write(&self.import_errors);

        constants.entry(alias.to_string()).or_default().extend(tables.constants);
        let order = macro_order.entry(alias.to_string()).or_default();
        let live_macros = macros.entry(alias.to_string()).or_default();
        for name in tables.macro_order.iter().chain(tables.macros.keys()) {
            if !live_macros.contains_key(name) && !order.contains(name) {
                order.push(name.clone());
            }
        }
        live_macros.extend(tables.macros);
        let originals = macros_original.entry(alias.to_string()).or_default();
        for (name, text) in tables.macros_original {
            originals.entry(name).or_insert(text);
        }
        typedefs.entry(alias.to_string()).or_default().extend(tables.typedefs);
        func_ptr_sigs
            .entry(alias.to_string())
            .or_default()
            .extend(tables.func_ptr_sigs);
        for def in tables.structs {
            structs.insert(def.name.clone(), def);
        }
        for data in tables.enums {
            let def = EnumDef::from(data);
            enums.insert(def.name().to_string(), def);
        }
        let live = signatures.entry(alias.to_string()).or_default();
        for (name, sig) in tables.signatures {
            let keep_live = live
                .get(&name)
                .map(|existing| existing.origin == SignatureOrigin::Manual)
                .unwrap_or(false);
            if !keep_live {
                live.insert(name, sig);
            }
        }
        import_errors.insert(alias.to_string(), tables.import_errors);
    }
}
