//! Earth Engine expressions and their value-graph encoding.
//!
//! `value:compute` takes an `Expression`: a table of value nodes keyed by id
//! plus the id of the result. Function invocations refer to their arguments
//! by `valueReference`; constants are inlined. Identical subtrees share one
//! entry in the table.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    Invocation {
        function: String,
        arguments: BTreeMap<String, Expr>,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn invoke<I, K>(function: &str, arguments: I) -> Self
    where
        I: IntoIterator<Item = (K, Expr)>,
        K: Into<String>,
    {
        Expr::Invocation {
            function: function.to_string(),
            arguments: arguments.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// `Image.load(id)`
    pub fn image_load(id: &str) -> Self {
        Self::invoke("Image.load", [("id", Self::constant(id))])
    }

    /// `GeometryConstructors.Point([lon, lat])`
    pub fn point(at: LonLat) -> Self {
        Self::invoke(
            "GeometryConstructors.Point",
            [("coordinates", Self::constant(json!([at.lon, at.lat])))],
        )
    }

    /// `Image.sample(image, region, scale)`
    pub fn sample(image: Expr, region: Expr, scale: f64) -> Self {
        Self::invoke(
            "Image.sample",
            [
                ("image", image),
                ("region", region),
                ("scale", Self::constant(scale)),
            ],
        )
    }

    /// `Collection.first(collection)`
    pub fn first(collection: Expr) -> Self {
        Self::invoke("Collection.first", [("collection", collection)])
    }

    /// `Element.get(object, property)`
    pub fn get(object: Expr, property: &str) -> Self {
        Self::invoke(
            "Element.get",
            [("object", object), ("property", Self::constant(property))],
        )
    }

    /// The band value of `dataset` at `at`, sampled at `scale` metres.
    pub fn point_sample(dataset: &str, at: LonLat, scale: f64, band: &str) -> Self {
        let sampled = Self::sample(Self::image_load(dataset), Self::point(at), scale);
        Self::get(Self::first(sampled), band)
    }

    pub fn encode(&self) -> Expression {
        let mut encoder = Encoder::default();
        let result = match self {
            Expr::Constant(value) => encoder.insert(json!({ "constantValue": value })),
            Expr::Invocation {
                function,
                arguments,
            } => encoder.invocation(function, arguments),
        };
        Expression {
            result,
            values: encoder.values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub result: String,
    pub values: BTreeMap<String, Value>,
}

#[derive(Default)]
struct Encoder {
    values: BTreeMap<String, Value>,
    seen: HashMap<String, String>,
}

impl Encoder {
    fn node(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Constant(value) => json!({ "constantValue": value }),
            Expr::Invocation {
                function,
                arguments,
            } => json!({ "valueReference": self.invocation(function, arguments) }),
        }
    }

    fn invocation(&mut self, function: &str, arguments: &BTreeMap<String, Expr>) -> String {
        let mut args = Map::new();
        for (name, arg) in arguments {
            args.insert(name.clone(), self.node(arg));
        }
        self.insert(json!({
            "functionInvocationValue": {
                "functionName": function,
                "arguments": Value::Object(args),
            }
        }))
    }

    fn insert(&mut self, node: Value) -> String {
        let key = node.to_string();
        if let Some(id) = self.seen.get(&key) {
            return id.clone();
        }
        let id = self.values.len().to_string();
        self.values.insert(id.clone(), node);
        self.seen.insert(key, id.clone());
        id
    }
}
