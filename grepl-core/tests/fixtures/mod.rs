#![allow(dead_code)]

use grepl_core::call::transport::{Client, ClientStream, StreamReceiver, StreamSender};
use grepl_core::descriptor::{PoolSource, RpcDescriptor};
use grepl_core::fill::{FieldPrompt, Prompt, PromptError};
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, MethodDescriptorProto,
    OneofDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tonic::{Status, metadata::MetadataMap};

// --- Schema ---

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn typed(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, ty)
    }
}

fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

fn in_oneof(mut field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    field.oneof_index = Some(index);
    field
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn method(name: &str, client_streaming: bool, server_streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(".api.HelloRequest".to_string()),
        output_type: Some(".api.HelloResponse".to_string()),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

/// ```proto
/// package api;
///
/// enum Gender { UNKNOWN = 0; FEMALE = 1; MALE = 2; }
/// message Address { string city = 1; int32 number = 2; }
/// message Person {
///   string name = 1;
///   int32 age = 2;
///   repeated string nicknames = 3;
///   Gender gender = 4;
///   Address address = 5;
///   oneof contact { string email = 6; string phone = 7; }
///   bytes avatar = 8;
///   map<string, int32> scores = 9;
///   repeated Address homes = 10;
/// }
/// message A { string name = 1; B b = 2; }
/// message B { A a = 1; }
/// message Outer { Inner inner = 1; }
/// message Inner { string name = 1; Inner next = 2; }
/// message Tags { repeated string tags = 1; string next = 2; }
/// message HelloRequest { string name = 1; }
/// message HelloResponse { string message = 1; }
///
/// service Example {
///   rpc Unary(HelloRequest) returns (HelloResponse);
///   rpc ClientStream(stream HelloRequest) returns (HelloResponse);
///   rpc ServerStream(HelloRequest) returns (stream HelloResponse);
///   rpc BidiStream(stream HelloRequest) returns (stream HelloResponse);
/// }
/// ```
pub fn file_descriptor_set() -> FileDescriptorSet {
    let scores_entry = DescriptorProto {
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..message(
            "ScoresEntry",
            vec![field("key", 1, Type::String), field("value", 2, Type::Int32)],
        )
    };

    let person = DescriptorProto {
        nested_type: vec![scores_entry],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("contact".to_string()),
            ..Default::default()
        }],
        ..message(
            "Person",
            vec![
                field("name", 1, Type::String),
                field("age", 2, Type::Int32),
                repeated(field("nicknames", 3, Type::String)),
                typed("gender", 4, Type::Enum, ".api.Gender"),
                typed("address", 5, Type::Message, ".api.Address"),
                in_oneof(field("email", 6, Type::String), 0),
                in_oneof(field("phone", 7, Type::String), 0),
                field("avatar", 8, Type::Bytes),
                repeated(typed("scores", 9, Type::Message, ".api.Person.ScoresEntry")),
                repeated(typed("homes", 10, Type::Message, ".api.Address")),
            ],
        )
    };

    let gender = EnumDescriptorProto {
        name: Some("Gender".to_string()),
        value: ["UNKNOWN", "FEMALE", "MALE"]
            .iter()
            .zip(0..)
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let file = FileDescriptorProto {
        name: Some("api.proto".to_string()),
        package: Some("api".to_string()),
        syntax: Some("proto3".to_string()),
        enum_type: vec![gender],
        message_type: vec![
            message(
                "Address",
                vec![field("city", 1, Type::String), field("number", 2, Type::Int32)],
            ),
            person,
            message(
                "A",
                vec![
                    field("name", 1, Type::String),
                    typed("b", 2, Type::Message, ".api.B"),
                ],
            ),
            message("B", vec![typed("a", 1, Type::Message, ".api.A")]),
            message("Outer", vec![typed("inner", 1, Type::Message, ".api.Inner")]),
            message(
                "Inner",
                vec![
                    field("name", 1, Type::String),
                    typed("next", 2, Type::Message, ".api.Inner"),
                ],
            ),
            message(
                "Tags",
                vec![
                    repeated(field("tags", 1, Type::String)),
                    field("next", 2, Type::String),
                ],
            ),
            message("HelloRequest", vec![field("name", 1, Type::String)]),
            message("HelloResponse", vec![field("message", 1, Type::String)]),
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("Example".to_string()),
            method: vec![
                method("Unary", false, false),
                method("ClientStream", true, false),
                method("ServerStream", false, true),
                method("BidiStream", true, true),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    FileDescriptorSet { file: vec![file] }
}

pub fn encoded_file_descriptor_set() -> Vec<u8> {
    file_descriptor_set().encode_to_vec()
}

pub fn pool() -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(file_descriptor_set())
        .expect("fixture schema is valid")
}

pub fn source() -> PoolSource {
    PoolSource::new(pool())
}

pub fn message_type(name: &str) -> MessageDescriptor {
    pool()
        .get_message_by_name(&format!("api.{name}"))
        .expect("fixture message exists")
}

pub fn rpc(name: &str) -> RpcDescriptor {
    let method = pool()
        .get_service_by_name("api.Example")
        .and_then(|s| s.methods().find(|m| m.name() == name))
        .expect("fixture method exists");
    RpcDescriptor::new(method)
}

// --- Prompt ---

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Step {
    Input(&'static str),
    Select(&'static str),
    EndOfInput,
    Abort,
}

/// A [`Prompt`] replaying a fixed script. Once the script runs out every read is
/// end-of-input.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    steps: VecDeque<Step>,
    /// Every field prompt that was shown, in order.
    pub inputs: Vec<FieldPrompt>,
    /// Every selection message and its options, in order.
    pub selects: Vec<(String, Vec<String>)>,
}

impl ScriptedPrompt {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.inputs.iter().map(|p| p.label.as_str()).collect()
    }
}

impl Prompt for ScriptedPrompt {
    fn input(&mut self, prompt: &FieldPrompt) -> Result<String, PromptError> {
        self.inputs.push(prompt.clone());
        match self.steps.pop_front() {
            Some(Step::Input(text)) => Ok(text.to_string()),
            Some(Step::EndOfInput) | None => Err(PromptError::EndOfInput),
            Some(Step::Abort) => Err(PromptError::Aborted),
            Some(step) => panic!("expected an input step for '{}', got {step:?}", prompt.label),
        }
    }

    fn select(&mut self, message: &str, options: &[String]) -> Result<String, PromptError> {
        self.selects.push((message.to_string(), options.to_vec()));
        match self.steps.pop_front() {
            Some(Step::Select(choice)) => Ok(choice.to_string()),
            Some(Step::EndOfInput) | None => Err(PromptError::EndOfInput),
            Some(Step::Abort) => Err(PromptError::Aborted),
            Some(step) => panic!("expected a select step for '{message}', got {step:?}"),
        }
    }
}

// --- Client ---

pub fn hello_request(name: &str) -> DynamicMessage {
    let mut request = DynamicMessage::new(message_type("HelloRequest"));
    request.set_field_by_name("name", Value::String(name.to_string()));
    request
}

pub fn name_of(request: &DynamicMessage) -> String {
    request
        .get_field_by_name("name")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn reply(rpc_response: MessageDescriptor, text: String) -> DynamicMessage {
    let mut response = DynamicMessage::new(rpc_response);
    response.set_field_by_name("message", Value::String(text));
    response
}

/// What the mock transport was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Invoke(String),
    OpenClientStream,
    OpenServerStream(String),
    OpenBidiStream,
    Send(String),
    CloseAndReceive,
    CloseSend,
}

#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
    metadata: Arc<Mutex<Vec<MetadataMap>>>,
}

impl Journal {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn metadata(&self) -> Vec<MetadataMap> {
        self.metadata.lock().unwrap().clone()
    }
}

/// An in-memory transport answering `hello <name>` to every request.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    pub journal: Journal,
    /// Returned by every operation instead of a response.
    pub failure: Option<Status>,
    /// Unary calls, bidirectional sends and bidirectional receives never complete.
    pub hang: bool,
}

impl MockClient {
    fn check(&self, metadata: MetadataMap) -> Result<(), Status> {
        self.journal.metadata.lock().unwrap().push(metadata);
        match &self.failure {
            Some(status) => Err(status.clone()),
            None => Ok(()),
        }
    }
}

impl Client for MockClient {
    type ClientStream = MockClientStream;
    type ServerStream = MockReceiver;
    type BidiSender = MockSender;
    type BidiReceiver = MockReceiver;

    async fn invoke(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
        request: DynamicMessage,
    ) -> Result<DynamicMessage, Status> {
        self.journal.record(Event::Invoke(name_of(&request)));
        self.check(metadata)?;
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(reply(rpc.response_type(), format!("hello {}", name_of(&request))))
    }

    async fn open_client_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
    ) -> Result<Self::ClientStream, Status> {
        self.journal.record(Event::OpenClientStream);
        self.check(metadata)?;
        Ok(MockClientStream {
            journal: self.journal.clone(),
            response_type: rpc.response_type(),
            names: Vec::new(),
        })
    }

    async fn open_server_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
        request: DynamicMessage,
    ) -> Result<Self::ServerStream, Status> {
        let name = name_of(&request);
        self.journal.record(Event::OpenServerStream(name.clone()));
        self.check(metadata)?;

        let (tx, rx) = mpsc::unbounded_channel();
        for i in 1..=3 {
            let _ = tx.send(Ok(reply(rpc.response_type(), format!("hello {name} #{i}"))));
        }
        Ok(MockReceiver { rx, open: None })
    }

    async fn open_bidi_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
    ) -> Result<(Self::BidiSender, Self::BidiReceiver), Status> {
        self.journal.record(Event::OpenBidiStream);
        self.check(metadata)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = MockReceiver {
            rx,
            open: self.hang.then(|| tx.clone()),
        };
        let sender = MockSender {
            journal: self.journal.clone(),
            response_type: rpc.response_type(),
            tx,
            hang: self.hang,
        };
        Ok((sender, receiver))
    }
}

pub struct MockClientStream {
    journal: Journal,
    response_type: MessageDescriptor,
    names: Vec<String>,
}

impl ClientStream for MockClientStream {
    async fn send(&mut self, request: DynamicMessage) -> Result<(), Status> {
        let name = name_of(&request);
        self.journal.record(Event::Send(name.clone()));
        self.names.push(name);
        Ok(())
    }

    async fn close_and_receive(self) -> Result<DynamicMessage, Status> {
        self.journal.record(Event::CloseAndReceive);
        Ok(reply(
            self.response_type,
            format!("hello {}", self.names.join(", ")),
        ))
    }
}

/// Echoes every request back as a response, as soon as it is sent.
pub struct MockSender {
    journal: Journal,
    response_type: MessageDescriptor,
    tx: mpsc::UnboundedSender<Result<DynamicMessage, Status>>,
    hang: bool,
}

impl StreamSender for MockSender {
    async fn send(&mut self, request: DynamicMessage) -> Result<(), Status> {
        let name = name_of(&request);
        self.journal.record(Event::Send(name.clone()));
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.tx
            .send(Ok(reply(self.response_type.clone(), format!("hello {name}"))))
            .map_err(|_| Status::aborted("receiver dropped"))
    }

    async fn close_send(self) -> Result<(), Status> {
        self.journal.record(Event::CloseSend);
        Ok(())
    }
}

pub struct MockReceiver {
    rx: mpsc::UnboundedReceiver<Result<DynamicMessage, Status>>,
    /// Keeps the stream from ending.
    open: Option<mpsc::UnboundedSender<Result<DynamicMessage, Status>>>,
}

impl StreamReceiver for MockReceiver {
    async fn receive(&mut self) -> Result<Option<DynamicMessage>, Status> {
        self.rx.recv().await.transpose()
    }
}
