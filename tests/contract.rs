//! Binding runtime functions and checking them at construction time.

use anyhow::Result;
use ironpipe::contract::{BoundFn, Capability, ParamType, Signature};
use ironpipe::testing::*;
use ironpipe::type_token::{Element, TypeTag};
use ironpipe::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i32,
    y: i32,
}

const HAS_ID: Capability = Capability::new("HasId", &["id"]);

fn users(p: &Pipeline) -> Pipe<User> {
    from_vec(
        p,
        vec![
            User { id: 1, name: "ann".into() },
            User { id: 2, name: "bob".into() },
        ],
    )
}

fn is_contract(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<PipeError>(), Some(PipeError::Contract { .. }))
}

#[test]
fn unary_map_binds() -> Result<()> {
    let p = TestPipeline::new();
    let names = users(&p)
        .map_fn::<String>(BoundFn::unary(|u: &User| u.name.to_uppercase()))?
        .collect_seq()?;
    assert_collections_equal(&names, &["ANN".to_string(), "BOB".to_string()]);
    Ok(())
}

#[test]
fn binary_map_is_rejected_at_construction() {
    let p = TestPipeline::new();
    let err = from_vec(&p, vec![1u32, 2])
        .map_fn::<u32>(BoundFn::binary(|a: &u32, b: &u32| a + b))
        .err()
        .expect("two-parameter map must be rejected");
    assert!(is_contract(&err), "unexpected error: {err:#}");
}

#[test]
fn wrong_parameter_type_is_rejected() {
    let p = TestPipeline::new();
    let result = from_vec(&p, vec![1i32]).map_fn::<usize>(BoundFn::unary(|s: &String| s.len()));
    assert!(result.is_err_and(|e| is_contract(&e)));
}

#[test]
fn declared_return_must_match_target_type() {
    let p = TestPipeline::new();
    let result = from_vec(&p, vec![1i32]).map_fn::<u64>(BoundFn::unary(|v: &i32| v.to_string()));
    assert!(result.is_err_and(|e| is_contract(&e)));
}

#[test]
fn filter_must_return_bool() -> Result<()> {
    let p = TestPipeline::new();
    let bad = from_vec(&p, vec![1i32, 2]).filter_fn(BoundFn::unary(|v: &i32| *v));
    assert!(bad.is_err_and(|e| is_contract(&e)));

    let good = from_iter(&p, 1..=6)
        .filter_fn(BoundFn::unary(|v: &i32| v % 2 == 0))?
        .collect_seq()?;
    assert_collections_equal(&good, &[2, 4, 6]);
    Ok(())
}

#[test]
fn untyped_parameter_accepts_any_element() -> Result<()> {
    let p = TestPipeline::new();
    let rendered = from_vec(&p, vec![1i32, 22])
        .map_fn::<String>(BoundFn::untyped(|v: &Value| v.to_string()))?
        .collect_seq()?;
    assert_collections_equal(&rendered, &["1".to_string(), "22".to_string()]);

    let ids = users(&p)
        .map_fn::<u64>(BoundFn::untyped(|v: &Value| v["id"].as_u64().unwrap_or(0)))?
        .collect_par()?;
    assert_collections_equal(&ids, &[1, 2]);
    Ok(())
}

#[test]
fn capability_is_checked_structurally() -> Result<()> {
    let p = TestPipeline::new();
    let ids = users(&p)
        .map_fn::<u64>(BoundFn::capability(HAS_ID, |v| v["id"].as_u64().unwrap_or(0)))?
        .collect_seq()?;
    assert_collections_equal(&ids, &[1, 2]);

    let points = from_vec(&p, vec![Point { x: 1, y: 2 }]);
    let missing = points.map_fn::<u64>(BoundFn::capability(HAS_ID, |_| 0u64));
    assert!(missing.is_err_and(|e| is_contract(&e)));

    let scalars = from_vec(&p, vec![5u64]);
    let missing = scalars.map_fn::<u64>(BoundFn::capability(HAS_ID, |_| 0u64));
    assert!(missing.is_err_and(|e| is_contract(&e)));
    Ok(())
}

#[test]
fn untyped_elements_are_checked_per_element() -> Result<()> {
    let p = TestPipeline::new();
    let values = from_vec(&p, vec![json!({ "id": 1 }), json!({ "name": "no id" })]);
    // Nothing is known about `Value` up front, so construction succeeds.
    let ids = values.map_fn::<u64>(BoundFn::capability(HAS_ID, |v| v["id"].as_u64().unwrap_or(0)))?;

    let err = ids.collect_seq().expect_err("second element lacks the field");
    assert!(matches!(
        err.downcast_ref::<PipeError>(),
        Some(PipeError::TypeMismatch { .. })
    ));

    let ok = from_vec(&p, vec![json!({ "id": 4 }), json!({ "id": 9, "extra": true })])
        .map_fn::<u64>(BoundFn::capability(HAS_ID, |v| v["id"].as_u64().unwrap_or(0)))?
        .collect_seq()?;
    assert_collections_equal(&ok, &[4, 9]);
    Ok(())
}

#[test]
fn sort_comparator_shape() -> Result<()> {
    let p = TestPipeline::new();
    let sorted = from_vec(&p, vec![3, 1, 4, 1, 5, 9])
        .sort_fn(BoundFn::binary(|a: &i32, b: &i32| a < b))?
        .collect_seq()?;
    assert_collections_equal(&sorted, &[1, 1, 3, 4, 5, 9]);

    let unary = from_vec(&p, vec![1]).sort_fn(BoundFn::unary(|a: &i32| *a > 0));
    assert!(unary.is_err_and(|e| is_contract(&e)));

    let not_bool = from_vec(&p, vec![1]).sort_fn(BoundFn::binary(|a: &i32, b: &i32| a - b));
    assert!(not_bool.is_err_and(|e| is_contract(&e)));
    Ok(())
}

#[test]
fn reduce_combiner_shape() -> Result<()> {
    let p = TestPipeline::new();
    let sum = from_range(&p, 1, 11, 1)?.reduce_fn(0i64, BoundFn::binary(|acc: &i64, v: &i64| acc + v))?;
    assert_eq!(sum, 55);

    let wrong_acc = from_range(&p, 1, 3, 1)?
        .reduce_fn(0i64, BoundFn::binary(|acc: &String, v: &i64| format!("{acc}{v}")));
    assert!(wrong_acc.is_err_and(|e| is_contract(&e)));
    Ok(())
}

#[test]
fn pair_extractor_for_maps() -> Result<()> {
    let p = TestPipeline::new();
    let src = from_iter(&p, 1..=3);
    let map = src.to_map_fn::<String, String>(BoundFn::pair(|v: &i32| {
        (format!("Key-{v}"), format!("Val-{v}"))
    }))?;
    assert_eq!(map.len(), 3);
    assert_eq!(map["Key-2"], "Val-2");

    let groups = src.to_grouped_map_fn::<bool, i32>(BoundFn::pair(|v: &i32| (v % 2 == 0, *v)))?;
    assert_grouped_map_equal(&groups, &[(false, vec![1, 3]), (true, vec![2])]);

    let single = src.to_map_fn::<String, String>(BoundFn::unary(|v: &i32| v.to_string()));
    assert!(single.is_err_and(|e| is_contract(&e)));
    Ok(())
}

#[test]
fn explicit_signature() -> Result<()> {
    let p = TestPipeline::new();
    let sig = Signature::new(vec![ParamType::Untyped], vec![TypeTag::of::<String>()]);
    let describe = BoundFn::from_parts(sig, |args: &[Element]| {
        let kind = match args[0].downcast_ref::<Value>() {
            Some(Value::Object(_)) => "object",
            Some(_) => "scalar",
            None => "unknown",
        };
        Ok(vec![Arc::new(kind.to_string()) as Element])
    });
    let kinds = users(&p).map_fn::<String>(describe)?.collect_seq()?;
    assert_collections_equal(&kinds, &["object".to_string(), "object".to_string()]);
    Ok(())
}

#[test]
fn lying_function_fails_at_evaluation() -> Result<()> {
    let p = TestPipeline::new();
    let sig = Signature::new(vec![ParamType::of::<i32>()], vec![TypeTag::of::<i32>()]);
    let nothing = BoundFn::from_parts(sig, |_: &[Element]| Ok(Vec::new()));
    let chain = from_vec(&p, vec![1i32]).map_fn::<i32>(nothing)?;
    let err = chain.collect_seq().expect_err("no return value");
    assert!(is_contract(&err));
    Ok(())
}
