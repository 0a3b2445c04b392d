use crate::core::error::{Result, VizError};
use crate::core::spa::expr::{self, Term};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Largest similarity tolerated between a new random pointer and existing ones
const MAX_SIMILARITY: f64 = 0.1;
/// Candidates drawn when searching for a sufficiently dissimilar pointer
const MAX_CANDIDATES: usize = 100;

/// A set of labeled reference vectors ("semantic pointers")
///
/// Parsing an expression that names an unknown key adds a fresh random
/// unit vector for it unless the vocabulary is read-only, so validation
/// must parse against a clone.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    dimensions: usize,
    keys: Vec<String>,
    vectors: Vec<Vec<f64>>,
    read_only: bool,
    rng: StdRng,
}

impl Vocabulary {
    pub fn new(dimensions: usize) -> Self {
        Self::with_rng(dimensions, StdRng::from_entropy())
    }

    pub fn with_seed(dimensions: usize, seed: u64) -> Self {
        Self::with_rng(dimensions, StdRng::seed_from_u64(seed))
    }

    fn with_rng(dimensions: usize, rng: StdRng) -> Self {
        Self {
            dimensions,
            keys: Vec::new(),
            vectors: Vec::new(),
            read_only: false,
            rng,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Look up a key's vector
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| self.vectors[i].as_slice())
    }

    /// Add a key with an explicit vector
    pub fn add(&mut self, key: &str, vector: Vec<f64>) -> Result<()> {
        validate_key(key)?;
        if vector.len() != self.dimensions {
            return Err(VizError::SizeMismatch {
                expected: self.dimensions,
                found: vector.len(),
                context: format!("vocabulary key '{}'", key),
            });
        }
        if self.get(key).is_some() {
            return Err(VizError::Vocabulary(format!("key '{}' already in vocabulary", key)));
        }
        self.keys.push(key.to_string());
        self.vectors.push(vector);
        Ok(())
    }

    /// Add a key with a random unit vector, returning the vector
    pub fn create_pointer(&mut self, key: &str) -> Result<Vec<f64>> {
        if self.read_only {
            return Err(VizError::Vocabulary(format!(
                "unknown key '{}' in read-only vocabulary",
                key
            )));
        }
        validate_key(key)?;

        let mut best: Option<(f64, Vec<f64>)> = None;
        for _ in 0..MAX_CANDIDATES {
            let candidate = self.random_unit_vector();
            let similarity = self
                .vectors
                .iter()
                .map(|v| dot(v, &candidate).abs())
                .fold(0.0, f64::max);
            if similarity < MAX_SIMILARITY {
                best = Some((similarity, candidate));
                break;
            }
            if best.as_ref().map_or(true, |(s, _)| similarity < *s) {
                best = Some((similarity, candidate));
            }
        }
        let vector = best.map(|(_, v)| v).unwrap_or_else(|| vec![0.0; self.dimensions]);
        self.add(key, vector.clone())?;
        Ok(vector)
    }

    fn random_unit_vector(&mut self) -> Vec<f64> {
        let raw: Vec<f64> = (0..self.dimensions)
            .map(|_| StandardNormal.sample(&mut self.rng))
            .collect();
        let norm = dot(&raw, &raw).sqrt();
        if norm > 0.0 {
            raw.into_iter().map(|x| x / norm).collect()
        } else {
            raw
        }
    }

    /// Evaluate an expression such as `A+0.5*B` or `A*~B` into a vector
    pub fn parse(&mut self, text: &str) -> Result<Vec<f64>> {
        let ast = expr::parse(text)?;
        match self.evaluate(&ast)? {
            Value::Scalar(s) => Ok(self.identity().into_iter().map(|x| x * s).collect()),
            Value::Vector(v) => Ok(v),
        }
    }

    /// The identity vector under circular convolution
    pub fn identity(&self) -> Vec<f64> {
        let mut v = vec![0.0; self.dimensions];
        if let Some(first) = v.first_mut() {
            *first = 1.0;
        }
        v
    }

    fn evaluate(&mut self, term: &Term) -> Result<Value> {
        Ok(match term {
            Term::Number(n) => Value::Scalar(*n),
            Term::Key(key) => match self.get(key) {
                Some(v) => Value::Vector(v.to_vec()),
                None => Value::Vector(self.create_pointer(key)?),
            },
            Term::Neg(inner) => match self.evaluate(inner)? {
                Value::Scalar(s) => Value::Scalar(-s),
                Value::Vector(v) => Value::Vector(v.into_iter().map(|x| -x).collect()),
            },
            Term::Invert(inner) => match self.evaluate(inner)? {
                Value::Vector(v) => Value::Vector(involution(&v)),
                Value::Scalar(_) => {
                    return Err(VizError::Vocabulary("'~' applies only to pointers".to_string()));
                }
            },
            Term::Add(a, b) => {
                let (a, b) = (self.evaluate(a)?, self.evaluate(b)?);
                self.combine(a, b, |x, y| x + y)
            }
            Term::Sub(a, b) => {
                let (a, b) = (self.evaluate(a)?, self.evaluate(b)?);
                self.combine(a, b, |x, y| x - y)
            }
            Term::Mul(a, b) => match (self.evaluate(a)?, self.evaluate(b)?) {
                (Value::Scalar(x), Value::Scalar(y)) => Value::Scalar(x * y),
                (Value::Scalar(s), Value::Vector(v)) | (Value::Vector(v), Value::Scalar(s)) => {
                    Value::Vector(v.into_iter().map(|x| x * s).collect())
                }
                (Value::Vector(x), Value::Vector(y)) => Value::Vector(convolve(&x, &y)),
            },
        })
    }

    fn combine(&self, a: Value, b: Value, op: fn(f64, f64) -> f64) -> Value {
        match (a, b) {
            (Value::Scalar(x), Value::Scalar(y)) => Value::Scalar(op(x, y)),
            (a, b) => {
                let a = self.as_vector(a);
                let b = self.as_vector(b);
                Value::Vector(a.iter().zip(&b).map(|(x, y)| op(*x, *y)).collect())
            }
        }
    }

    fn as_vector(&self, value: Value) -> Vec<f64> {
        match value {
            Value::Vector(v) => v,
            Value::Scalar(s) => self.identity().into_iter().map(|x| x * s).collect(),
        }
    }

    /// Every unordered pair of keys, bound by circular convolution (`A*B`)
    pub fn pairs(&self) -> Vec<(String, Vec<f64>)> {
        let mut pairs = Vec::new();
        for i in 0..self.keys.len() {
            for j in (i + 1)..self.keys.len() {
                pairs.push((
                    format!("{}*{}", self.keys[i], self.keys[j]),
                    convolve(&self.vectors[i], &self.vectors[j]),
                ));
            }
        }
        pairs
    }

    /// Linear map from this vocabulary's space into `other`'s, over shared keys
    ///
    /// The result has one row per dimension of `other`.
    pub fn transform_to(&self, other: &Vocabulary) -> Vec<Vec<f64>> {
        let mut matrix = vec![vec![0.0; self.dimensions]; other.dimensions];
        for (key, source) in self.keys.iter().zip(&self.vectors) {
            if let Some(target) = other.get(key) {
                for (r, row) in matrix.iter_mut().enumerate() {
                    for (c, cell) in row.iter_mut().enumerate() {
                        *cell += target[r] * source[c];
                    }
                }
            }
        }
        matrix
    }
}

enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
}

fn validate_key(key: &str) -> Result<()> {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => {
            return Err(VizError::Vocabulary(format!(
                "semantic pointer '{}' must begin with a capital letter",
                key
            )));
        }
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(VizError::Vocabulary(format!("invalid semantic pointer name '{}'", key)))
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Circular convolution of two equal-length vectors
pub fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len();
    (0..n)
        .map(|k| (0..n).map(|j| a[j] * b[(n + k - j) % n]).sum())
        .collect()
}

/// Approximate inverse under circular convolution
pub fn involution(a: &[f64]) -> Vec<f64> {
    let n = a.len();
    (0..n).map(|i| a[(n - i) % n]).collect()
}

/// Multiply a matrix (rows of equal length) by a vector
pub fn mat_vec(matrix: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    matrix.iter().map(|row| dot(row, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(dims: usize) -> Vocabulary {
        let mut vocab = Vocabulary::with_seed(dims, 7);
        for (i, key) in ["A", "B", "C", "D"].iter().take(dims).enumerate() {
            let mut v = vec![0.0; dims];
            v[i] = 1.0;
            vocab.add(key, v).unwrap();
        }
        vocab
    }

    #[test]
    fn test_parse_linear_combination() {
        let mut vocab = basis(4);
        let v = vocab.parse("A+0.5*C").unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.5, 0.0]);
        let v = vocab.parse("D-B").unwrap();
        assert_eq!(v, vec![0.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_parse_zero_is_zero_vector() {
        let mut vocab = basis(4);
        assert_eq!(vocab.parse("0").unwrap(), vec![0.0; 4]);
    }

    #[test]
    fn test_parse_unknown_key_extends_vocabulary() {
        let mut vocab = basis(4);
        let v = vocab.parse("NEW").unwrap();
        assert_eq!(vocab.len(), 5);
        let norm: f64 = dot(&v, &v).sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_lowercase_and_read_only() {
        let mut vocab = basis(4);
        assert!(vocab.parse("dog").is_err());
        let mut frozen = basis(4).read_only();
        assert!(frozen.parse("NEW").is_err());
        assert!(frozen.parse("A").is_ok());
    }

    #[test]
    fn test_convolution_with_identity() {
        let vocab = basis(4);
        let a = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(convolve(&a, &vocab.identity()), a);
    }

    #[test]
    fn test_pairs_and_transform() {
        let vocab = basis(3);
        let pairs = vocab.pairs();
        let names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["A*B", "A*C", "B*C"]);

        let mut other = Vocabulary::with_seed(2, 1);
        other.add("B", vec![1.0, 0.0]).unwrap();
        other.add("C", vec![0.0, 1.0]).unwrap();
        let t = vocab.transform_to(&other);
        assert_eq!(t.len(), 2);
        assert_eq!(mat_vec(&t, &[0.0, 1.0, 0.0]), vec![1.0, 0.0]);
        assert_eq!(mat_vec(&t, &[1.0, 0.0, 0.0]), vec![0.0, 0.0]);
    }
}
