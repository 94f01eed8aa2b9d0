#![deny(missing_docs)]

//! # Resolver Pipeline
//!
//! User-defined validation hooks, run after binding and schema validation.
//!
//! A type opts in by implementing [`Resolver`] or [`ResolverWithPath`] and
//! declaring `#[model(resolver)]` or `#[model(resolver_with_path)]`. The
//! [`Walker`] then visits the decoded input graph: a value's own resolvers run
//! before its fields are visited, fields are visited in declaration order,
//! sequences in index order.

use crate::context::Context;
use crate::descriptor::{Model, ParamSource};
use crate::errors::{ErrorDetail, ValidateResult};
use crate::path::PathBuffer;

/// Validation hook that does not need to know where its value sits.
pub trait Resolver {
    /// Returns the problems found; locations are used as given.
    fn resolve(&self, ctx: &dyn Context) -> Vec<ErrorDetail>;
}

/// Validation hook that receives the location of its value.
pub trait ResolverWithPath {
    /// Returns the problems found, typically located with `prefix.with(..)`.
    fn resolve(&self, ctx: &dyn Context, prefix: &PathBuffer) -> Vec<ErrorDetail>;
}

/// Cursor over a value graph that collects resolver output.
pub struct Walker<'a> {
    ctx: &'a dyn Context,
    path: &'a mut PathBuffer,
    result: &'a mut ValidateResult,
}

impl<'a> Walker<'a> {
    /// Starts a walk at the current location of `path`.
    pub fn new(
        ctx: &'a dyn Context,
        path: &'a mut PathBuffer,
        result: &'a mut ValidateResult,
    ) -> Self {
        Self { ctx, path, result }
    }

    /// Runs a path-unaware resolver.
    pub fn resolver<R: Resolver>(&mut self, value: &R) {
        let errors = Resolver::resolve(value, self.ctx);
        self.result.extend(errors);
    }

    /// Runs a path-aware resolver at the current location.
    pub fn resolver_with_path<R: ResolverWithPath>(&mut self, value: &R) {
        let errors = ResolverWithPath::resolve(value, self.ctx, self.path);
        self.result.extend(errors);
    }

    /// Visits a named field or map entry.
    pub fn field<T: Model>(&mut self, key: &str, value: &T) {
        self.path.push(key);
        value.walk(self);
        self.path.pop();
    }

    /// Visits a sequence element.
    pub fn index<T: Model>(&mut self, index: usize, value: &T) {
        self.path.push_index(index);
        value.walk(self);
        self.path.pop();
    }

    /// Visits a bound parameter, located as `<source>.<name>`.
    pub fn param<T: Model>(&mut self, source: ParamSource, name: &str, value: &T) {
        self.path.push(source.as_str());
        self.field(name, value);
        self.path.pop();
    }

    /// Visits a flattened record without adding a segment.
    pub fn flatten<T: Model>(&mut self, value: &T) {
        value.walk(self);
    }

    /// The current location.
    pub fn path(&self) -> &PathBuffer {
        self.path
    }

    /// The request being handled.
    pub fn context(&self) -> &dyn Context {
        self.ctx
    }
}

/// Runs every resolver reachable from `value`, appending their errors to `result`.
pub fn resolve<T: Model>(
    value: &T,
    ctx: &dyn Context,
    path: &mut PathBuffer,
    result: &mut ValidateResult,
) {
    let mut walker = Walker::new(ctx, path, result);
    value.walk(&mut walker);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Request, RequestContext};
    use crate::operation::Operation;
    use crate::Model;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};

    #[derive(Model)]
    #[model(resolver_with_path)]
    struct Leaf {
        field2: String,
    }

    impl ResolverWithPath for Leaf {
        fn resolve(&self, _ctx: &dyn Context, prefix: &PathBuffer) -> Vec<ErrorDetail> {
            vec![ErrorDetail::new("resolver error")
                .with_location(prefix.with("field2"))
                .with_value(self.field2.clone())]
        }
    }

    #[derive(Model)]
    struct Branch {
        field1: HashMap<String, Vec<Leaf>>,
    }

    #[derive(Model)]
    #[model(resolver)]
    struct Outer {
        #[model(path = "id")]
        id: String,
        #[model(body)]
        body: Branch,
    }

    impl Resolver for Outer {
        fn resolve(&self, ctx: &dyn Context) -> Vec<ErrorDetail> {
            vec![ErrorDetail::new(format!("outer saw {}", ctx.method())).with_location("path.id")]
        }
    }

    #[derive(Model, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[model(resolver_with_path)]
    struct Label {
        text: String,
    }

    impl ResolverWithPath for Label {
        fn resolve(&self, _ctx: &dyn Context, prefix: &PathBuffer) -> Vec<ErrorDetail> {
            vec![ErrorDetail::new(format!("label {}", self.text)).with_location(prefix.as_str())]
        }
    }

    #[derive(Model)]
    struct Labels {
        labels: HashSet<Label>,
    }

    #[test]
    fn test_set_elements_are_walked_in_order() {
        let op = Operation::new("post", "/labels");
        let req = Request::new("POST", "/labels");
        let ctx = RequestContext::new(&op, &req);

        let labels = ["zeta", "alpha", "mid"]
            .into_iter()
            .map(|text| Label { text: text.into() })
            .collect();
        let input = Labels { labels };

        let mut path = PathBuffer::new();
        path.push("body");
        let mut result = ValidateResult::new();
        resolve(&input, &ctx, &mut path, &mut result);

        let locations: Vec<String> = result
            .errors()
            .iter()
            .map(|e| format!("{} @ {}", e.message, e.location.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            locations,
            vec![
                "label alpha @ body.labels[0]",
                "label mid @ body.labels[1]",
                "label zeta @ body.labels[2]",
            ]
        );
    }

    #[test]
    fn test_nested_path_aware_locations() {
        let op = Operation::new("put", "/test/{id}");
        let req = Request::new("PUT", "/test/1");
        let ctx = RequestContext::new(&op, &req);

        let mut field1 = HashMap::new();
        field1.insert(
            "foo".to_string(),
            vec![
                Leaf {
                    field2: "bar".into(),
                },
                Leaf {
                    field2: "baz".into(),
                },
            ],
        );
        let input = Outer {
            id: "1".into(),
            body: Branch { field1 },
        };

        let mut path = PathBuffer::new();
        let mut result = ValidateResult::new();
        resolve(&input, &ctx, &mut path, &mut result);

        let locations: Vec<String> = result
            .errors()
            .iter()
            .map(|e| format!("{} @ {}", e.message, e.location.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            locations,
            vec![
                "outer saw PUT @ path.id",
                "resolver error @ body.field1.foo[0].field2",
                "resolver error @ body.field1.foo[1].field2",
            ]
        );
        assert!(path.is_empty());
    }
}
