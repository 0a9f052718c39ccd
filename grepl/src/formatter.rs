//! # Output Formatting
//!
//! Everything the binary prints besides RPC responses goes through [`FormattedString`]:
//! errors, name listings and protobuf-like renderings of descriptors.
use colored::*;
use grepl_core::{
    call::CallError,
    descriptor::{Descriptor, SourceError},
    fill::PromptError,
    grpc::client::ClientConnectError,
    header::HeaderError,
    prost_reflect::{
        self, EnumDescriptor, Kind, MessageDescriptor, MethodDescriptor, ServiceDescriptor,
    },
    reflection::client::ReflectionError,
};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
#[derive(Debug)]
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

pub struct PackageList(pub Vec<String>);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

fn error(title: &str, err: impl std::fmt::Display) -> FormattedString {
    FormattedString(format!("{}\n\n'{}'", title.red().bold(), err))
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        error("Call Failed:", err)
    }
}

impl From<SourceError> for FormattedString {
    fn from(err: SourceError) -> Self {
        error("Symbol Lookup Failed:", err)
    }
}

impl From<HeaderError> for FormattedString {
    fn from(err: HeaderError) -> Self {
        error("Invalid Header:", err)
    }
}

impl From<PromptError> for FormattedString {
    fn from(err: PromptError) -> Self {
        error("Failed to open the terminal:", err)
    }
}

impl From<ClientConnectError> for FormattedString {
    fn from(err: ClientConnectError) -> Self {
        error("Connection Error:", err)
    }
}

impl From<ReflectionError> for FormattedString {
    fn from(err: ReflectionError) -> Self {
        error("Reflection Failed:", err)
    }
}

impl From<prost_reflect::DescriptorError> for FormattedString {
    fn from(err: prost_reflect::DescriptorError) -> Self {
        error("Failed to parse file descriptor:", err)
    }
}

impl From<std::io::Error> for FormattedString {
    fn from(err: std::io::Error) -> Self {
        error("Failed to read file:", err)
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<PackageList> for FormattedString {
    fn from(PackageList(packages): PackageList) -> Self {
        if packages.is_empty() {
            return FormattedString("No packages found.".yellow().to_string());
        }

        let mut out = String::from("Available Packages:\n");
        for package in packages {
            let name = if package.is_empty() {
                "(default package)".to_string()
            } else {
                package
            };
            out.push_str(&format!("  - {}\n", name.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<Descriptor> for FormattedString {
    fn from(descriptor: Descriptor) -> Self {
        match descriptor {
            Descriptor::ServiceDescriptor(d) => d.into(),
            Descriptor::MessageDescriptor(d) => d.into(),
            Descriptor::EnumDescriptor(d) => d.into(),
        }
    }
}

impl From<ServiceDescriptor> for FormattedString {
    fn from(service: ServiceDescriptor) -> Self {
        let methods: Vec<String> = service
            .methods()
            .map(|method| format!("  {}", FormattedString::from(method).0))
            .collect();

        FormattedString(format!(
            "{} {} {{\n{}\n}}",
            "service".cyan(),
            service.full_name().green(),
            methods.join("\n")
        ))
    }
}

impl From<MethodDescriptor> for FormattedString {
    fn from(method: MethodDescriptor) -> Self {
        let input_stream = if method.is_client_streaming() {
            format!("{} ", "stream".cyan())
        } else {
            "".to_string()
        };
        let output_stream = if method.is_server_streaming() {
            format!("{} ", "stream".cyan())
        } else {
            "".to_string()
        };

        FormattedString(format!(
            "{} {}({}{}) {} ({}{});",
            "rpc".cyan(),
            method.name().green(),
            input_stream,
            method.input().full_name().yellow(),
            "returns".cyan(),
            output_stream,
            method.output().full_name().yellow()
        ))
    }
}

impl From<MessageDescriptor> for FormattedString {
    fn from(message: MessageDescriptor) -> Self {
        let mut out = format!("{} {} {{\n", "message".cyan(), message.name().green());

        for field in message.fields() {
            if field.containing_oneof().is_some_and(|o| !o.is_synthetic()) {
                continue;
            }
            out.push_str(&format!("  {}\n", field_line(&field)));
        }

        for oneof in message.oneofs().filter(|o| !o.is_synthetic()) {
            out.push_str(&format!("  {} {} {{\n", "oneof".cyan(), oneof.name()));
            for field in oneof.fields() {
                out.push_str(&format!("    {}\n", field_line(&field)));
            }
            out.push_str("  }\n");
        }

        out.push('}');
        FormattedString(out)
    }
}

fn field_line(field: &prost_reflect::FieldDescriptor) -> String {
    let type_name = match field.kind() {
        Kind::Message(entry) if field.is_map() => format!(
            "map<{}, {}>",
            kind_name(&entry.map_entry_key_field().kind()),
            kind_name(&entry.map_entry_value_field().kind())
        ),
        kind => kind_name(&kind),
    };
    let label = if field.is_list() {
        format!("{} ", "repeated".cyan())
    } else {
        String::new()
    };

    format!(
        "{label}{} {} = {};",
        type_name.yellow(),
        field.name(),
        field.number()
    )
}

fn kind_name(kind: &Kind) -> String {
    let name = match kind {
        Kind::Double => "double",
        Kind::Float => "float",
        Kind::Int32 => "int32",
        Kind::Int64 => "int64",
        Kind::Uint32 => "uint32",
        Kind::Uint64 => "uint64",
        Kind::Sint32 => "sint32",
        Kind::Sint64 => "sint64",
        Kind::Fixed32 => "fixed32",
        Kind::Fixed64 => "fixed64",
        Kind::Sfixed32 => "sfixed32",
        Kind::Sfixed64 => "sfixed64",
        Kind::Bool => "bool",
        Kind::String => "string",
        Kind::Bytes => "bytes",
        Kind::Message(m) => m.full_name(),
        Kind::Enum(e) => e.full_name(),
    };
    name.to_string()
}

impl From<EnumDescriptor> for FormattedString {
    fn from(enum_desc: EnumDescriptor) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "enum".cyan(),
            enum_desc.name().green()
        ));

        for val in enum_desc.values() {
            out.push_str(&format!(
                "  {} = {};\n",
                val.name(),
                val.number().to_string().purple()
            ));
        }
        out.push('}');

        FormattedString(out)
    }
}
