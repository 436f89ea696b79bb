//! Node macros
//!
//! Each macro is a placeholder token `_#NAME#_` usable in `failOn`/`counts`
//! lists. The table maps it to a regex template and the dump region it is
//! matched against. Parameterized macros (`*_OF_CLASS`, `*_OF_FIELD`,
//! `*_OF_METHOD`) take the next list element as parameter and substitute it
//! for `{param}`.
//!
//! Ideal graph lines look like
//! `  42  StoreI  === 5 7 41 12  [[ 43 ]]  @pkg/Foo+12 *, name=x, idx=4;`
//! and assembly lines like
//! `  0x18: call,static  wrapper for: _new_instance_Java`.
//!
//! Adding a node kind is a table entry; nothing else changes.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Dump region a node macro is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Ideal graph (after optimizations)
    Ideal,
    /// Final machine code listing
    Assembly,
}

/// Kind of parameter a macro consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeParam {
    /// No parameter
    None,
    /// Class name, dotted or slashed; matched exactly
    Class,
    /// Field name
    Field,
    /// Method name
    Method,
}

/// One entry of the node table.
#[derive(Debug, Clone, Copy)]
pub struct NodeDef {
    /// Macro name without the `_#`/`#_` delimiters
    pub name: &'static str,
    /// Region the expanded regex is matched against
    pub region: Region,
    /// Parameter kind
    pub param: NodeParam,
    /// Regex template; `{param}` is replaced by the escaped parameter
    pub template: &'static str,
}

const PLACEHOLDER_START: &str = "_#";
const PLACEHOLDER_END: &str = "#_";

/// Class qualification: optional package segments, then the exact name,
/// then the `:`/`+` that ends a type in the dump.
const CLASS_PREFIX: &str = r"(?:[\w$]+/)*";

impl NodeDef {
    /// Expand the template with `param` (ignored for unparameterized macros).
    pub fn expand(&self, param: Option<&str>) -> String {
        let Some(param) = param else {
            return self.template.to_string();
        };
        let replacement = match self.param {
            NodeParam::None => return self.template.to_string(),
            NodeParam::Class => format!(
                "{}{}",
                CLASS_PREFIX,
                regex::escape(&param.trim().replace('.', "/"))
            ),
            NodeParam::Field | NodeParam::Method => regex::escape(param.trim()),
        };
        self.template.replace("{param}", &replacement)
    }

    /// The placeholder token for this macro.
    pub fn placeholder(&self) -> String {
        format!("{}{}{}", PLACEHOLDER_START, self.name, PLACEHOLDER_END)
    }
}

/// If `token` is a placeholder, the macro name inside it.
pub fn placeholder_name(token: &str) -> Option<&str> {
    token
        .trim()
        .strip_prefix(PLACEHOLDER_START)?
        .strip_suffix(PLACEHOLDER_END)
}

/// Look up a macro by name.
pub fn lookup(name: &str) -> Option<&'static NodeDef> {
    NODE_INDEX.get(name).copied()
}

/// All known macros in table order.
pub fn all() -> &'static [NodeDef] {
    NODE_DEFS
}

static NODE_INDEX: Lazy<HashMap<&'static str, &'static NodeDef>> =
    Lazy::new(|| NODE_DEFS.iter().map(|def| (def.name, def)).collect());

macro_rules! node_table {
    ($($name:ident => $region:ident, $param:ident, $template:expr;)*) => {
        $(
            #[doc = concat!("Node macro `", stringify!($name), "`")]
            pub const $name: &str = concat!("_#", stringify!($name), "#_");
        )*

        static NODE_DEFS: &[NodeDef] = &[
            $(
                NodeDef {
                    name: stringify!($name),
                    region: Region::$region,
                    param: NodeParam::$param,
                    template: $template,
                },
            )*
        ];
    };
}

// Building blocks for ideal graph templates.
macro_rules! ideal {
    ($node:expr) => {
        concat!(r"\d+\s+(?:", $node, r")\s+===.*")
    };
    ($node:expr, class) => {
        concat!(r"\d+\s+(?:", $node, r")\s+===.*@{param}[:+]\S* \*.*")
    };
    ($node:expr, field) => {
        concat!(r"\d+\s+(?:", $node, r")\s+===.*name={param},.*")
    };
    ($node:expr, method) => {
        concat!(r"\d+\s+(?:", $node, r")\s+===.*[ .:]{param}\b.*")
    };
    ($node:expr, trap $reason:expr) => {
        concat!(r"\d+\s+(?:", $node, r")\s+===.*uncommon_trap.*", $reason, ".*")
    };
}

node_table! {
    // Memory
    STORE => Ideal, None, ideal!("Store[BCSILFDPN]");
    STORE_B => Ideal, None, ideal!("StoreB");
    STORE_C => Ideal, None, ideal!("StoreC");
    STORE_I => Ideal, None, ideal!("StoreI");
    STORE_L => Ideal, None, ideal!("StoreL");
    STORE_F => Ideal, None, ideal!("StoreF");
    STORE_D => Ideal, None, ideal!("StoreD");
    STORE_P => Ideal, None, ideal!("StoreP");
    STORE_N => Ideal, None, ideal!("StoreN");
    STORE_VECTOR => Ideal, None, ideal!("StoreVector");
    STORE_OF_CLASS => Ideal, Class, ideal!("Store[BCSILFDPN]", class);
    STORE_I_OF_CLASS => Ideal, Class, ideal!("StoreI", class);
    STORE_OF_FIELD => Ideal, Field, ideal!("Store[BCSILFDPN]", field);
    LOAD => Ideal, None, ideal!("Load(?:B|UB|S|US|I|L|F|D|P|N)");
    LOAD_B => Ideal, None, ideal!("LoadB");
    LOAD_UB => Ideal, None, ideal!("LoadUB");
    LOAD_S => Ideal, None, ideal!("LoadS");
    LOAD_US => Ideal, None, ideal!("LoadUS");
    LOAD_I => Ideal, None, ideal!("LoadI");
    LOAD_L => Ideal, None, ideal!("LoadL");
    LOAD_F => Ideal, None, ideal!("LoadF");
    LOAD_D => Ideal, None, ideal!("LoadD");
    LOAD_P => Ideal, None, ideal!("LoadP");
    LOAD_N => Ideal, None, ideal!("LoadN");
    LOAD_KLASS => Ideal, None, ideal!("LoadN?Klass");
    LOAD_VECTOR => Ideal, None, ideal!("LoadVector");
    LOAD_OF_CLASS => Ideal, Class, ideal!("Load(?:B|UB|S|US|I|L|F|D|P|N)", class);
    LOAD_I_OF_CLASS => Ideal, Class, ideal!("LoadI", class);
    LOAD_OF_FIELD => Ideal, Field, ideal!("Load(?:B|UB|S|US|I|L|F|D|P|N)", field);
    MEMBAR => Ideal, None, ideal!(r"MemBar\w*");
    MEMBAR_STORESTORE => Ideal, None, ideal!("MemBarStoreStore");

    // Control flow
    LOOP => Ideal, None, ideal!("Loop");
    COUNTEDLOOP => Ideal, None, ideal!("CountedLoop");
    COUNTEDLOOP_MAIN => Ideal, None, r"\d+\s+(?:CountedLoop)\s+===.*main.*";
    IF => Ideal, None, ideal!("If");
    SAFEPOINT => Ideal, None, ideal!("SafePoint");
    RETURN => Ideal, None, ideal!("Return");
    HALT => Ideal, None, ideal!("Halt");

    // Arithmetic
    ADD => Ideal, None, ideal!("Add(?:I|L|F|D|P)");
    ADD_I => Ideal, None, ideal!("AddI");
    ADD_L => Ideal, None, ideal!("AddL");
    ADD_VI => Ideal, None, ideal!("AddVI");
    SUB => Ideal, None, ideal!("Sub(?:I|L|F|D)");
    SUB_I => Ideal, None, ideal!("SubI");
    SUB_L => Ideal, None, ideal!("SubL");
    MUL => Ideal, None, ideal!("Mul(?:I|L|F|D)");
    MUL_I => Ideal, None, ideal!("MulI");
    MUL_L => Ideal, None, ideal!("MulL");
    MUL_VI => Ideal, None, ideal!("MulVI");
    DIV => Ideal, None, ideal!("Div(?:I|L|F|D)");
    MOD_I => Ideal, None, ideal!("ModI");
    MOD_L => Ideal, None, ideal!("ModL");
    ABS_I => Ideal, None, ideal!("AbsI");
    NEG_I => Ideal, None, ideal!("NegI");
    LSHIFT => Ideal, None, ideal!("LShift(?:I|L)");
    RSHIFT => Ideal, None, ideal!("RShift(?:I|L)");
    URSHIFT => Ideal, None, ideal!("URShift(?:B|S|I|L)");
    AND => Ideal, None, ideal!("And(?:I|L)");
    OR => Ideal, None, ideal!("Or(?:I|L)");
    XOR => Ideal, None, ideal!("Xor(?:I|L)");
    CMP_I => Ideal, None, ideal!("CmpI");
    CMP_U => Ideal, None, ideal!("CmpU");
    CMP_UL => Ideal, None, ideal!("CmpUL");
    CMP_P => Ideal, None, ideal!("CmpP");
    CONV_I2L => Ideal, None, ideal!("ConvI2L");
    CONV_L2I => Ideal, None, ideal!("ConvL2I");
    CAST_II => Ideal, None, ideal!("CastII");
    CAST_LL => Ideal, None, ideal!("CastLL");
    POPCOUNT_L => Ideal, None, ideal!("PopCountL");

    // Calls and traps
    CALL => Ideal, None, ideal!(r"Call\w*Java");
    CALL_OF_METHOD => Ideal, Method, ideal!(r"Call\w*Java", method);
    STATIC_CALL_OF_METHOD => Ideal, Method, ideal!("CallStaticJava", method);
    DYNAMIC_CALL_OF_METHOD => Ideal, Method, ideal!("CallDynamicJava", method);
    TRAP => Ideal, None, ideal!("CallStaticJava", trap "reason");
    PREDICATE_TRAP => Ideal, None, ideal!("CallStaticJava", trap "predicate");
    UNSTABLE_IF_TRAP => Ideal, None, ideal!("CallStaticJava", trap "unstable_if");
    CLASS_CHECK_TRAP => Ideal, None, ideal!("CallStaticJava", trap "class_check");
    NULL_CHECK_TRAP => Ideal, None, ideal!("CallStaticJava", trap "null_check");
    NULL_ASSERT_TRAP => Ideal, None, ideal!("CallStaticJava", trap "null_assert");
    RANGE_CHECK_TRAP => Ideal, None, ideal!("CallStaticJava", trap "range_check");
    UNHANDLED_TRAP => Ideal, None, ideal!("CallStaticJava", trap "unhandled");
    INTRINSIC_TRAP => Ideal, None, ideal!("CallStaticJava", trap "intrinsic");

    // Machine code
    ALLOC => Assembly, None, r".*(?i:call,static).*wrapper for: _new_instance_Java.*";
    ALLOC_OF_CLASS => Assembly, Class, r".*precise (?:klass )?{param}:.*";
    ALLOC_ARRAY => Assembly, None, r".*(?i:call,static).*wrapper for: _new_array_Java.*";
    ALLOC_ARRAY_OF_CLASS => Assembly, Class, r".*precise (?:klass )?\[L{param};:.*";
    CHECKCAST_ARRAY => Assembly, None, r".*cmp.*precise (?:klass )?\[.*;:.*";
    CHECKCAST_ARRAY_OF_CLASS => Assembly, Class, r".*cmp.*precise (?:klass )?\[L{param};:.*";
    CHECKCAST_ARRAYCOPY => Assembly, None, r".*(?i:call_leaf_nofp,runtime)\s+checkcast_arraycopy.*";
    FIELD_ACCESS => Assembly, None, r".*Field: .*";
    SCOPE_OBJECT => Assembly, None, r".*# ScObj.*";
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn node_regex(name: &str, param: Option<&str>) -> Regex {
        let def = lookup(name).unwrap();
        Regex::new(&def.expand(param)).unwrap()
    }

    #[test]
    fn every_template_compiles() {
        for def in all() {
            let param = match def.param {
                NodeParam::None => None,
                _ => Some("pkg.Sample"),
            };
            assert!(
                Regex::new(&def.expand(param)).is_ok(),
                "{} does not compile",
                def.name
            );
        }
    }

    #[test]
    fn placeholders_round_trip_through_lookup() {
        assert_eq!(STORE, "_#STORE#_");
        assert_eq!(placeholder_name(STORE_OF_CLASS), Some("STORE_OF_CLASS"));
        assert_eq!(placeholder_name("StoreI"), None);
        assert_eq!(lookup("STORE").map(|d| d.placeholder()), Some(STORE.to_string()));
        assert!(lookup("NO_SUCH_NODE").is_none());
    }

    #[test]
    fn store_matches_ideal_lines() {
        let re = node_regex("STORE", None);
        assert!(re.is_match("  42  StoreI  === 5 7 41 12  [[ 43 ]]  @pkg/Foo+12 *, name=x, idx=4;"));
        assert!(!re.is_match("  43  LoadI  === 5 7 41  [[ 44 ]]  @pkg/Foo+12 *, name=x, idx=4;"));
    }

    #[test]
    fn class_parameter_matches_exactly() {
        let re = node_regex("STORE_OF_CLASS", Some("pkg.Base"));
        let base = "  42  StoreI  === 5 7 41 12  [[ 43 ]]  @pkg/Base+12 *, name=x, idx=4;";
        let sub = "  42  StoreI  === 5 7 41 12  [[ 43 ]]  @pkg/SubBase+12 *, name=x, idx=4;";
        let ext = "  42  StoreI  === 5 7 41 12  [[ 43 ]]  @pkg/BaseSub+12 *, name=x, idx=4;";
        assert!(re.is_match(base));
        assert!(!re.is_match(sub));
        assert!(!re.is_match(ext));

        let simple = node_regex("STORE_OF_CLASS", Some("Base"));
        assert!(simple.is_match(base));
        assert!(!simple.is_match(sub));
    }

    #[test]
    fn field_parameter() {
        let re = node_regex("STORE_OF_FIELD", Some("count"));
        assert!(re.is_match("  42  StoreI  === 5 7 41 12  [[ ]]  @pkg/Foo+12 *, name=count, idx=4;"));
        assert!(!re.is_match("  42  StoreI  === 5 7 41 12  [[ ]]  @pkg/Foo+12 *, name=counter, idx=4;"));
    }

    #[test]
    fn trap_and_alloc() {
        let trap = node_regex("NULL_CHECK_TRAP", None);
        assert!(trap.is_match(
            "  50  CallStaticJava  === 1 2 3  [[ ]] uncommon_trap(reason='null_check' action='maybe_recompile')"
        ));
        let alloc = node_regex("ALLOC", None);
        assert!(alloc.is_match("  0x0018: call,static  wrapper for: _new_instance_Java"));
        assert_eq!(lookup("ALLOC").map(|d| d.region), Some(Region::Assembly));
    }
}
