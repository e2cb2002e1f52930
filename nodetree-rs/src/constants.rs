//! Constants used throughout xml-nodetree.

/// Namespace bound to the `xml` prefix.
pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of namespace declaration attributes.
pub const XMLNS_ATTRIBUTE_NS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// Prefix (and bare attribute name) of namespace declarations.
pub const XMLNS_PREFIX: &str = "xmlns";

/// XML Schema instance namespace.
pub const SCHEMA_INSTANCE_NS_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Local name of the schema location attribute.
pub const SCHEMA_LOCATION: &str = "schemaLocation";

/// XInclude namespace.
pub const XINCLUDE_NS_URI: &str = "http://www.w3.org/2001/XInclude";

/// Indentation width used when none is given.
pub const DEFAULT_INDENTATION: usize = 2;

/// Encoding written for documents parsed from in-memory strings.
pub const DEFAULT_ENCODING: &str = "UTF-8";
