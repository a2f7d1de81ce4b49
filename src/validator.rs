use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result of validating one channel's input.
pub type ValidationResult<T> = Result<T, ValidationFailure>;

/// A single problem reported by a validator.
///
/// `path` locates the offending value inside the input (empty for the root).
/// Messages must not echo rejected input back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Location of the offending value, empty for the whole input
    pub path: String,
    /// Human-readable description of the problem
    pub message: String,
}

impl ErrorDetail {
    /// Creates a new error detail.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Rejection returned by a [`Validator`]; never carries partial data.
///
/// # Examples
///
/// ```
/// use schema_endpoint::{ErrorDetail, ValidationFailure};
///
/// let failure = ValidationFailure::single("age", "must be positive");
/// assert_eq!(failure.errors(), &[ErrorDetail::new("age", "must be positive")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed with {} error(s)", errors.len())]
pub struct ValidationFailure {
    errors: Vec<ErrorDetail>,
}

impl ValidationFailure {
    /// Creates a failure from a list of errors.
    pub fn new(errors: Vec<ErrorDetail>) -> Self {
        Self { errors }
    }

    /// Creates a failure carrying a single error.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![ErrorDetail::new(path, message)])
    }

    /// Returns the reported errors.
    pub fn errors(&self) -> &[ErrorDetail] {
        &self.errors
    }

    /// Consumes the failure, returning the reported errors.
    pub fn into_errors(self) -> Vec<ErrorDetail> {
        self.errors
    }
}

/// A pluggable schema for one channel.
///
/// `Validator` is the seam between the endpoint adapter and whatever schema
/// engine the application uses. Input always arrives as a JSON value: the
/// query string as a flat object of strings, the body as parsed JSON or text,
/// form data as an object of fields.
///
/// # Invariants
///
/// Implementations MUST:
/// - Return `Ok` only for input that fully satisfies the schema
/// - Report every problem they find in the returned [`ValidationFailure`]
/// - Be free of side effects, so validating the same input twice gives the
///   same answer
///
/// # Examples
///
/// ```
/// use schema_endpoint::{Validator, ValidationResult, ValidationFailure};
/// use serde_json::Value;
///
/// struct NonEmptyString;
///
/// impl Validator for NonEmptyString {
///     type Output = String;
///
///     fn validate(&self, input: Value) -> ValidationResult<String> {
///         match input {
///             Value::String(s) if !s.is_empty() => Ok(s),
///             _ => Err(ValidationFailure::single("", "expected a non-empty string")),
///         }
///     }
/// }
///
/// assert!(NonEmptyString.validate(Value::from("hi")).is_ok());
/// assert!(NonEmptyString.validate(Value::Null).is_err());
/// ```
pub trait Validator: Send + Sync {
    /// The strongly-typed value produced on success.
    type Output;

    /// Validates a channel's input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailure`] if the input does not satisfy the schema.
    fn validate(&self, input: Value) -> ValidationResult<Self::Output>;

    /// Validates a channel that received no input at all.
    ///
    /// Schemas see an explicit `null` so they can decide whether absence is
    /// acceptable. [`AcceptAll`] overrides this to yield an empty object.
    fn validate_absent(&self) -> ValidationResult<Self::Output> {
        self.validate(Value::Null)
    }
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    type Output = V::Output;

    fn validate(&self, input: Value) -> ValidationResult<Self::Output> {
        (**self).validate(input)
    }

    fn validate_absent(&self) -> ValidationResult<Self::Output> {
        (**self).validate_absent()
    }
}

impl<V: Validator + ?Sized> Validator for std::sync::Arc<V> {
    type Output = V::Output;

    fn validate(&self, input: Value) -> ValidationResult<Self::Output> {
        (**self).validate(input)
    }

    fn validate_absent(&self) -> ValidationResult<Self::Output> {
        (**self).validate_absent()
    }
}

/// The default validator for channels with no configured schema.
///
/// Passes any input through unchanged. A channel with no input at all
/// yields an empty JSON object rather than a failure.
///
/// # Examples
///
/// ```
/// use schema_endpoint::{AcceptAll, Validator};
/// use serde_json::json;
///
/// assert_eq!(AcceptAll.validate(json!([1, 2])).unwrap(), json!([1, 2]));
/// assert_eq!(AcceptAll.validate_absent().unwrap(), json!({}));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    type Output = Value;

    fn validate(&self, input: Value) -> ValidationResult<Value> {
        Ok(input)
    }

    fn validate_absent(&self) -> ValidationResult<Value> {
        Ok(Value::Object(Map::new()))
    }
}

/// A schema described by a serde type.
///
/// Input is accepted when it deserializes into `T`. Unknown object keys are
/// ignored unless `T` opts into `#[serde(deny_unknown_fields)]`.
///
/// # Examples
///
/// ```
/// use schema_endpoint::{Schema, Validator};
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Debug, Deserialize)]
/// struct Greeting {
///     name: String,
/// }
///
/// let schema = Schema::<Greeting>::new();
/// assert_eq!(schema.validate(json!({ "name": "alice" })).unwrap().name, "alice");
/// assert!(schema.validate(json!({ "name": 7 })).is_err());
/// ```
pub struct Schema<T> {
    _type: PhantomData<fn() -> T>,
}

impl<T> Schema<T> {
    /// Creates a schema for `T`.
    pub fn new() -> Self {
        Self { _type: PhantomData }
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Schema<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Validator for Schema<T> {
    type Output = T;

    fn validate(&self, input: Value) -> ValidationResult<T> {
        serde_json::from_value(input).map_err(|err| ValidationFailure::single("", err.to_string()))
    }
}

/// A validator backed by a closure.
///
/// Created with [`from_fn`].
pub struct FnValidator<F> {
    f: F,
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator").finish_non_exhaustive()
    }
}

/// Wraps a closure as a [`Validator`].
///
/// # Examples
///
/// ```
/// use schema_endpoint::{from_fn, ValidationFailure, Validator};
/// use serde_json::{json, Value};
///
/// let even = from_fn(|input: Value| match input.as_u64() {
///     Some(n) if n % 2 == 0 => Ok(n),
///     _ => Err(ValidationFailure::single("", "expected an even number")),
/// });
///
/// assert_eq!(even.validate(json!(4)).unwrap(), 4);
/// assert!(even.validate(json!(3)).is_err());
/// ```
pub fn from_fn<F, T>(f: F) -> FnValidator<F>
where
    F: Fn(Value) -> ValidationResult<T> + Send + Sync,
{
    FnValidator { f }
}

impl<F, T> Validator for FnValidator<F>
where
    F: Fn(Value) -> ValidationResult<T> + Send + Sync,
{
    type Output = T;

    fn validate(&self, input: Value) -> ValidationResult<T> {
        (self.f)(input)
    }
}

/// A validator with an extra check applied to its typed output.
///
/// Created with [`ValidatorExt::refine`].
pub struct Refine<V, P> {
    inner: V,
    path: String,
    message: String,
    predicate: P,
}

impl<V: fmt::Debug, P> fmt::Debug for Refine<V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refine")
            .field("inner", &self.inner)
            .field("path", &self.path)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl<V, P> Validator for Refine<V, P>
where
    V: Validator,
    P: Fn(&V::Output) -> bool + Send + Sync,
{
    type Output = V::Output;

    fn validate(&self, input: Value) -> ValidationResult<V::Output> {
        let value = self.inner.validate(input)?;
        self.check(value)
    }

    fn validate_absent(&self) -> ValidationResult<V::Output> {
        let value = self.inner.validate_absent()?;
        self.check(value)
    }
}

impl<V, P> Refine<V, P>
where
    V: Validator,
    P: Fn(&V::Output) -> bool + Send + Sync,
{
    fn check(&self, value: V::Output) -> ValidationResult<V::Output> {
        if (self.predicate)(&value) {
            Ok(value)
        } else {
            Err(ValidationFailure::single(
                self.path.clone(),
                self.message.clone(),
            ))
        }
    }
}

/// Combinators available on every [`Validator`].
pub trait ValidatorExt: Validator + Sized {
    /// Adds a check on the validated value, for cross-field invariants.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_endpoint::{Schema, Validator, ValidatorExt};
    /// use serde::Deserialize;
    /// use serde_json::json;
    ///
    /// #[derive(Deserialize)]
    /// struct Range {
    ///     min: u32,
    ///     max: u32,
    /// }
    ///
    /// let range = Schema::<Range>::new().refine("max", "max must not be below min", |r| r.min <= r.max);
    /// assert!(range.validate(json!({ "min": 1, "max": 5 })).is_ok());
    /// assert!(range.validate(json!({ "min": 9, "max": 5 })).is_err());
    /// ```
    fn refine<P>(
        self,
        path: impl Into<String>,
        message: impl Into<String>,
        predicate: P,
    ) -> Refine<Self, P>
    where
        P: Fn(&Self::Output) -> bool + Send + Sync,
    {
        Refine {
            inner: self,
            path: path.into(),
            message: message.into(),
            predicate,
        }
    }

    /// Erases the concrete validator type.
    fn boxed(self) -> Box<dyn Validator<Output = Self::Output>>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<V: Validator> ValidatorExt for V {}
