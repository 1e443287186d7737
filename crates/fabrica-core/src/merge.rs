use crate::value::{AttrMap, AttrValue};

/// Deep merge of two attribute trees. Pure: neither input is mutated.
///
/// Rules, per key present on either side:
/// 1. an association placeholder on the override side replaces the base value
///    wholesale, it is never merged into or resolved here;
/// 2. array + array concatenates, base elements first;
/// 3. object + object recurses;
/// 4. otherwise the override wins, including an explicit `Null` clearing a
///    defined base value.
///
/// Base insertion order is kept; keys only present in the override append.
pub fn merge_deep(base: &AttrMap, overrides: &AttrMap) -> AttrMap {
    let mut merged = base.clone();
    for (key, value) in overrides {
        let next = match (merged.get(key), value) {
            (_, AttrValue::Association(_)) => value.clone(),
            (Some(AttrValue::Array(head)), AttrValue::Array(tail)) => {
                let mut items = head.clone();
                items.extend(tail.iter().cloned());
                AttrValue::Array(items)
            }
            (Some(AttrValue::Object(under)), AttrValue::Object(over)) => {
                AttrValue::Object(merge_deep(under, over))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}
