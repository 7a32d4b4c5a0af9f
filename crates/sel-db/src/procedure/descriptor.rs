//! Stored procedure descriptor

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::types::DataType;
use crate::Result;

/// Driver-specific parameter options (length, precision, scale, ...).
pub type ParameterOptions = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: DataType,
    pub value: Value,
    pub is_input: bool,
    pub options: ParameterOptions,
}

/// One callable stored procedure: its name, advisory timeout and parameters
/// in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDescriptor {
    name: String,
    timeout: Duration,
    parameters: Vec<Parameter>,
}

impl ProcedureDescriptor {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            timeout,
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forwarded to the session with the request. The queue itself never
    /// cancels a call that runs past it.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn push(
        &mut self,
        is_input: bool,
        name: impl Into<String>,
        type_name: &str,
        value: impl Into<Value>,
        options: ParameterOptions,
    ) -> Result<&mut Self> {
        let data_type = DataType::resolve(type_name)?;
        self.parameters.push(Parameter {
            name: name.into(),
            data_type,
            value: value.into(),
            is_input,
            options,
        });
        Ok(self)
    }

    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        type_name: &str,
        value: impl Into<Value>,
        options: ParameterOptions,
    ) -> Result<&mut Self> {
        self.push(true, name, type_name, value, options)
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        type_name: &str,
        value: impl Into<Value>,
        options: ParameterOptions,
    ) -> Result<&mut Self> {
        self.push(false, name, type_name, value, options)
    }

    /// Chaining form of [`add_input`](Self::add_input) without options.
    pub fn input(
        mut self,
        name: impl Into<String>,
        type_name: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.push(true, name, type_name, value, ParameterOptions::new())?;
        Ok(self)
    }

    /// Chaining form of [`add_output`](Self::add_output) without options.
    pub fn output(
        mut self,
        name: impl Into<String>,
        type_name: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.push(false, name, type_name, value, ParameterOptions::new())?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parameters_keep_registration_order() {
        let sp = ProcedureDescriptor::new("GetUser", Duration::from_secs(5))
            .input("userId", "int", 42)
            .unwrap()
            .output("userName", "varchar(100)", Value::Null)
            .unwrap()
            .input("tenant", "nvarchar", "acme")
            .unwrap();

        let names: Vec<_> = sp.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["userId", "userName", "tenant"]);

        let directions: Vec<_> = sp.parameters().iter().map(|p| p.is_input).collect();
        assert_eq!(directions, vec![true, false, true]);
    }

    #[test]
    fn test_types_are_resolved() {
        let sp = ProcedureDescriptor::new("GetUser", Duration::from_secs(5))
            .input("userId", "int", 42)
            .unwrap()
            .output("userName", "varchar(100)", Value::Null)
            .unwrap();

        assert_eq!(sp.parameters()[0].data_type, DataType::Int);
        assert_eq!(sp.parameters()[0].value, json!(42));
        assert_eq!(sp.parameters()[1].data_type, DataType::VarChar);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut sp = ProcedureDescriptor::new("GetUser", Duration::from_secs(5));
        let err = sp
            .add_input("userId", "integer64", 42, ParameterOptions::new())
            .unwrap_err();
        assert!(err.is_invalid_data_type());
        assert!(sp.parameters().is_empty());
    }

    #[test]
    fn test_options_are_kept() {
        let mut options = ParameterOptions::new();
        options.insert("length".to_string(), json!(100));

        let mut sp = ProcedureDescriptor::new("GetUser", Duration::from_millis(1500));
        sp.add_output("userName", "nvarchar(100)", Value::Null, options.clone())
            .unwrap();

        assert_eq!(sp.parameters()[0].options, options);
        assert_eq!(sp.timeout(), Duration::from_millis(1500));
        assert_eq!(sp.name(), "GetUser");
    }

    #[test]
    fn test_add_methods_chain() {
        let mut sp = ProcedureDescriptor::new("Audit", Duration::from_secs(1));
        sp.add_input("a", "int", 1, ParameterOptions::new())
            .unwrap()
            .add_input("b", "bit", true, ParameterOptions::new())
            .unwrap();
        assert_eq!(sp.parameters().len(), 2);
        assert_eq!(sp.parameters()[1].data_type, DataType::Bit);
    }
}
