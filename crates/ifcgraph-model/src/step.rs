//! STEP physical file (ISO 10303-21) reader.
//!
//! The exchange structure is split into `;`-terminated statements first
//! (strings and comments are respected), then each `DATA` statement is parsed
//! with `nom`. [`load`] maps the parsed instances onto a [`MemoryModel`] using
//! a [`Schema`] for attribute names and inverse attributes.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use tracing::{debug, info};

use crate::error::ModelReadError;
use crate::memory::MemoryModel;
use crate::model::{Attribute, AttributeKind, EntityHandle};
use crate::schema::{AttributeRole, Schema};
use crate::value::Value;

/// A parameter as written in the exchange structure.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// `$`
    Null,
    /// `*`, a value derived in a subtype.
    Derived,
    Reference(u64),
    String(String),
    Enum(String),
    Integer(i64),
    Real(f64),
    Binary(String),
    List(Vec<StepValue>),
    /// `IFCLABEL('x')` style typed parameter.
    Typed(String, Vec<StepValue>),
}

impl StepValue {
    /// Literal form of a parameter. References have no literal form and map
    /// to `Null`.
    pub fn to_value(&self) -> Value {
        match self {
            StepValue::Null | StepValue::Derived | StepValue::Reference(_) => Value::Null,
            StepValue::String(s) => Value::String(s.clone()),
            StepValue::Enum(e) => match e.as_str() {
                "T" => Value::Boolean(true),
                "F" => Value::Boolean(false),
                "U" => Value::Logical(None),
                _ => Value::Enum(e.clone()),
            },
            StepValue::Integer(i) => Value::Integer(*i),
            StepValue::Real(r) => Value::Real(*r),
            StepValue::Binary(b) => Value::Binary(b.clone()),
            StepValue::List(items) => Value::List(items.iter().map(StepValue::to_value).collect()),
            StepValue::Typed(_, inner) => match inner.as_slice() {
                [single] => single.to_value(),
                many => Value::List(many.iter().map(StepValue::to_value).collect()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepInstance {
    pub id: u64,
    /// Line the statement starts on, for error reporting.
    pub line: usize,
    pub type_name: String,
    pub args: Vec<StepValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepFile {
    pub schemas: Vec<String>,
    pub instances: Vec<StepInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Header,
    Data,
    Done,
}

/// Parse the exchange structure.
pub fn parse(text: &str) -> Result<StepFile, ModelReadError> {
    let mut file = StepFile::default();
    let mut section = Section::Preamble;

    for (line, statement) in statements(text)? {
        let trimmed = statement.trim();
        match (section, trimmed) {
            (Section::Preamble, "ISO-10303-21") => section = Section::Header,
            (Section::Preamble, _) => {
                return Err(parse_error(line, "missing ISO-10303-21 preamble"));
            }
            (Section::Header, "HEADER") => {}
            (Section::Header, "ENDSEC") => {}
            (Section::Header, "DATA") => section = Section::Data,
            (Section::Header, _) => {
                if let Ok((_, schemas)) = all_consuming(file_schema)(trimmed) {
                    file.schemas = schemas;
                }
            }
            (Section::Data, "ENDSEC") => section = Section::Header,
            (Section::Data, _) => {
                let (_, (id, type_name, args)) = all_consuming(instance)(trimmed)
                    .map_err(|_| parse_error(line, &format!("invalid instance `{}`", snippet(trimmed))))?;
                file.instances.push(StepInstance {
                    id,
                    line,
                    type_name,
                    args,
                });
            }
            (Section::Done, _) => {}
        }
        if trimmed == "END-ISO-10303-21" {
            section = Section::Done;
        }
    }

    if section == Section::Preamble {
        return Err(parse_error(1, "missing ISO-10303-21 preamble"));
    }
    Ok(file)
}

/// Parse `text` and build a model from it.
pub fn load(text: &str, schema: &Schema) -> Result<MemoryModel, ModelReadError> {
    let file = parse(text)?;
    info!(
        "Parsed {} STEP instances (schemas: {})",
        file.instances.len(),
        file.schemas.join(", ")
    );
    build_model(&file, schema)
}

/// Map parsed instances onto a model. Ids are declared before attributes
/// are converted, so references may point forward.
pub fn build_model(file: &StepFile, schema: &Schema) -> Result<MemoryModel, ModelReadError> {
    let mut model = MemoryModel::new();

    let mut handles = Vec::with_capacity(file.instances.len());
    for inst in &file.instances {
        let type_name = schema
            .canonical_name(&inst.type_name)
            .unwrap_or(inst.type_name.as_str());
        handles.push(model.declare(inst.id, type_name)?);
    }

    for (inst, &handle) in file.instances.iter().zip(&handles) {
        let attributes = convert_arguments(&mut model, schema, handle, inst.id, &inst.type_name, &inst.args)?;
        model.set_attributes(handle, attributes)?;
    }

    model.derive_from_schema(schema);
    Ok(model)
}

fn convert_arguments(
    model: &mut MemoryModel,
    schema: &Schema,
    owner: EntityHandle,
    key: u64,
    type_name: &str,
    args: &[StepValue],
) -> Result<Vec<Attribute>, ModelReadError> {
    let declared: Vec<(String, Option<AttributeRole>)> = match schema.entity(type_name) {
        Some(ty) => {
            let decls = schema.all_attributes(&ty.name);
            if decls.len() != args.len() {
                return Err(ModelReadError::ArityMismatch {
                    key,
                    type_name: ty.name.clone(),
                    expected: decls.len(),
                    found: args.len(),
                });
            }
            decls.into_iter().map(|d| (d.name.clone(), Some(d.kind))).collect()
        }
        None => (0..args.len()).map(|i| (format!("Arg{}", i), None)).collect(),
    };

    let mut attributes = Vec::with_capacity(args.len());
    for ((name, role), arg) in declared.into_iter().zip(args) {
        let kind = convert_argument(model, schema, owner, key, &name, role, arg)?;
        attributes.push(Attribute { name, kind });
    }
    Ok(attributes)
}

/// Classify one argument. The value's shape wins over the declared role
/// (SELECT types mix entities and literals); the role decides what an
/// omitted value becomes.
fn convert_argument(
    model: &mut MemoryModel,
    schema: &Schema,
    owner: EntityHandle,
    key: u64,
    name: &str,
    role: Option<AttributeRole>,
    arg: &StepValue,
) -> Result<AttributeKind, ModelReadError> {
    if role == Some(AttributeRole::Derived) {
        return Ok(AttributeKind::Derived);
    }
    let kind = match arg {
        StepValue::Derived => AttributeKind::Derived,
        StepValue::Null => match role {
            Some(AttributeRole::Entity) => AttributeKind::EntityRef(None),
            Some(AttributeRole::Aggregate) => AttributeKind::AggregateRef(Vec::new()),
            _ => AttributeKind::Literal(Value::Null),
        },
        StepValue::Reference(_) | StepValue::Typed(..) if is_entity_valued(schema, arg) => {
            AttributeKind::EntityRef(convert_element(model, schema, owner, key, name, 0, arg)?)
        }
        StepValue::List(items) if items.iter().any(|i| is_entity_valued(schema, i)) => {
            let mut elements = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                elements.push(convert_element(model, schema, owner, key, name, index, item)?);
            }
            AttributeKind::AggregateRef(elements)
        }
        StepValue::List(items) if items.is_empty() && role == Some(AttributeRole::Aggregate) => {
            AttributeKind::AggregateRef(Vec::new())
        }
        other => AttributeKind::Literal(other.to_value()),
    };
    Ok(kind)
}

fn is_entity_valued(schema: &Schema, arg: &StepValue) -> bool {
    match arg {
        StepValue::Reference(_) => true,
        StepValue::Typed(name, _) => schema.entity(name).is_some(),
        _ => false,
    }
}

fn convert_element(
    model: &mut MemoryModel,
    schema: &Schema,
    owner: EntityHandle,
    key: u64,
    name: &str,
    index: usize,
    arg: &StepValue,
) -> Result<Option<EntityHandle>, ModelReadError> {
    match arg {
        StepValue::Reference(id) => {
            let resolved = model.resolve(*id);
            if resolved.is_none() {
                debug!("Unresolved reference #{} -> #{} ({})", key, id, name);
            }
            Ok(resolved)
        }
        StepValue::Typed(type_name, args) if schema.entity(type_name).is_some() => {
            let canonical = schema
                .canonical_name(type_name)
                .unwrap_or(type_name.as_str())
                .to_string();
            let inline = model.add_inline(owner, name, index, canonical.clone(), Vec::new())?;
            let attributes = convert_arguments(model, schema, inline, key, &canonical, args)?;
            model.set_attributes(inline, attributes)?;
            Ok(Some(inline))
        }
        _ => Ok(None),
    }
}

fn parse_error(line: usize, message: &str) -> ModelReadError {
    ModelReadError::Parse {
        line,
        message: message.to_string(),
    }
}

fn snippet(statement: &str) -> String {
    const MAX: usize = 60;
    match statement.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &statement[..i]),
        None => statement.to_string(),
    }
}

/// Split into `;`-terminated statements with their starting line, dropping
/// `/* */` comments.
fn statements(text: &str) -> Result<Vec<(usize, String)>, ModelReadError> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut line = 1;
    let mut start_line = None;
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        if in_string {
            current.push(c);
            if c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let comment_line = line;
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '\n' {
                        line += 1;
                    }
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(parse_error(comment_line, "unterminated comment"));
                }
            }
            ';' => {
                let statement = std::mem::take(&mut current);
                if !statement.trim().is_empty() {
                    out.push((start_line.unwrap_or(line), statement));
                }
                start_line = None;
            }
            _ => {
                if c == '\'' {
                    in_string = true;
                }
                if start_line.is_none() && !c.is_whitespace() {
                    start_line = Some(line);
                }
                current.push(c);
            }
        }
    }

    if in_string {
        return Err(parse_error(start_line.unwrap_or(line), "unterminated string"));
    }
    if !current.trim().is_empty() {
        return Err(parse_error(start_line.unwrap_or(line), "statement is missing `;`"));
    }
    Ok(out)
}

fn instance(input: &str) -> IResult<&str, (u64, String, Vec<StepValue>)> {
    let (input, id) = preceded(char('#'), map_res(digit1, str::parse::<u64>))(input)?;
    let (input, _) = delimited(multispace0, char('='), multispace0)(input)?;
    let (input, type_name) = keyword(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = parameter_list(input)?;
    Ok((input, (id, type_name.to_ascii_uppercase(), args)))
}

fn file_schema(input: &str) -> IResult<&str, Vec<String>> {
    let (input, _) = tag("FILE_SCHEMA")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = parameter_list(input)?;
    let schemas = args
        .into_iter()
        .flat_map(|arg| match arg {
            StepValue::List(items) => items,
            other => vec![other],
        })
        .filter_map(|v| match v {
            StepValue::String(s) => Some(s),
            _ => None,
        })
        .collect();
    Ok((input, schemas))
}

fn keyword(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn parameter_list(input: &str) -> IResult<&str, Vec<StepValue>> {
    delimited(
        pair(char('('), multispace0),
        separated_list0(delimited(multispace0, char(','), multispace0), parameter),
        pair(multispace0, char(')')),
    )(input)
}

fn parameter(input: &str) -> IResult<&str, StepValue> {
    alt((
        value(StepValue::Null, char('$')),
        value(StepValue::Derived, char('*')),
        map(reference, StepValue::Reference),
        map(string, StepValue::String),
        map(binary, StepValue::Binary),
        map(enumeration, StepValue::Enum),
        map(parameter_list, StepValue::List),
        typed,
        number,
    ))(input)
}

fn reference(input: &str) -> IResult<&str, u64> {
    preceded(char('#'), map_res(digit1, str::parse::<u64>))(input)
}

fn string(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('\'')(input)?;
    let mut raw = String::new();
    loop {
        let (r, chunk) = take_while(|c: char| c != '\'')(rest)?;
        raw.push_str(chunk);
        let (r, _) = char('\'')(r)?;
        match r.strip_prefix('\'') {
            Some(r) => {
                raw.push('\'');
                rest = r;
            }
            None => return Ok((r, decode_string(&raw))),
        }
    }
}

fn binary(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_while(|c: char| c.is_ascii_hexdigit()), char('"')),
        str::to_string,
    )(input)
}

fn enumeration(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('.'),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            char('.'),
        ),
        str::to_ascii_uppercase,
    )(input)
}

fn typed(input: &str) -> IResult<&str, StepValue> {
    let (input, name) = keyword(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = parameter_list(input)?;
    Ok((input, StepValue::Typed(name.to_ascii_uppercase(), args)))
}

fn number(input: &str) -> IResult<&str, StepValue> {
    let (input, text) = recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let parsed = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().map(StepValue::Real)
    } else {
        text.parse::<i64>().ok().map(StepValue::Integer)
    };
    match parsed {
        Some(v) => Ok((input, v)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

/// Decode the control directives of a STEP string:
///
/// - `\\` is a backslash
/// - `\X\hh` is one ISO 8859-1 byte
/// - `\X2\…\X0\` and `\X4\…\X0\` are UTF-16 and UTF-32 code units in hex
/// - `\S\c` is `c` shifted into the upper half of the code page
/// - `\PA\`..`\PI\` select an ISO 8859 part
///
/// Page switches are consumed but `\S\` is always decoded against part 1
/// (Latin-1). Malformed or unknown directives are kept verbatim.
fn decode_string(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        if let Some(tail) = rest.strip_prefix("\\\\") {
            out.push('\\');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("\\X2\\") {
            rest = decode_units(tail, 4, &mut out, |units| {
                let units: Vec<u16> = units.iter().map(|&u| u as u16).collect();
                char::decode_utf16(units)
                    .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            })
            .unwrap_or_else(|| verbatim(&mut out, rest, 4));
        } else if let Some(tail) = rest.strip_prefix("\\X4\\") {
            rest = decode_units(tail, 8, &mut out, |units| {
                units
                    .iter()
                    .map(|&u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            })
            .unwrap_or_else(|| verbatim(&mut out, rest, 4));
        } else if let Some(tail) = rest.strip_prefix("\\X\\") {
            match tail.get(..2).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                Some(byte) => {
                    out.push(char::from(byte));
                    rest = &tail[2..];
                }
                None => rest = verbatim(&mut out, rest, 3),
            }
        } else if let Some(tail) = rest.strip_prefix("\\S\\") {
            match tail.chars().next() {
                Some(c) if (' '..='~').contains(&c) => {
                    out.push(char::from(c as u8 + 0x80));
                    rest = &tail[1..];
                }
                _ => rest = verbatim(&mut out, rest, 3),
            }
        } else if let Some(tail) = rest
            .strip_prefix("\\P")
            .filter(|t| t.len() >= 2 && matches!(t.as_bytes()[0], b'A'..=b'I') && t.as_bytes()[1] == b'\\')
        {
            rest = &tail[2..];
        } else {
            rest = verbatim(&mut out, rest, 1);
        }
    }
    out.push_str(rest);
    out
}

/// Decode hex code units of `width` digits up to the closing `\X0\`,
/// returning the text after it. `None` when the directive is malformed.
fn decode_units<'a>(
    tail: &'a str,
    width: usize,
    out: &mut String,
    decode: impl Fn(&[u32]) -> String,
) -> Option<&'a str> {
    let end = tail.find("\\X0\\")?;
    let hex = &tail[..end];
    if hex.is_empty() || hex.len() % width != 0 {
        return None;
    }
    let units = hex
        .as_bytes()
        .chunks(width)
        .map(|c| {
            std::str::from_utf8(c)
                .ok()
                .and_then(|h| u32::from_str_radix(h, 16).ok())
        })
        .collect::<Option<Vec<u32>>>()?;
    out.push_str(&decode(&units));
    Some(&tail[end + 4..])
}

/// Copy the first `len` bytes of `rest` unchanged and return the remainder.
fn verbatim<'a>(out: &mut String, rest: &'a str, len: usize) -> &'a str {
    out.push_str(&rest[..len]);
    &rest[len..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityModel;

    const SAMPLE: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('sample.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
/* owner history */
#1=IFCPERSON($,'Doe','Jane',$,$,$,$,$);
#2=IFCORGANIZATION($,'Acme; Inc.',$,$,$);
#3=IFCPERSONANDORGANIZATION(#1,#2,$);
#4=IFCAPPLICATION(#2,'1.0','Tool','tool');
#5=IFCOWNERHISTORY(#3,#4,$,.ADDED.,$,$,$,1700000000);
#6=IFCCARTESIANPOINT((0.,0.,1.E-3));
#7=IFCAXIS2PLACEMENT3D(#6,$,$);
#8=IFCLOCALPLACEMENT($,#7);
#10=IFCPROJECT('0001',#5,'Demo',$,$,$,$,(),$);
#20=IFCBUILDINGSTOREY('0002',#5,'Level 1',$,$,#8,$,$,.ELEMENT.,0.);
#21=IFCWALL('0003',#5,'Wall \X2\00E9\X0\',$,$,#8,$,'T-1',.STANDARD.);
#22=IFCWALL('0004',#5,'It''s',$,$,IFCLOCALPLACEMENT($,#7),$,$,$);
#30=IFCRELCONTAINEDINSPATIALSTRUCTURE('0005',#5,$,$,(#21,#22,#99),#20);
#40=IFCRELAGGREGATES('0006',#5,$,$,#10,(#20));
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_parse_sample() {
        let file = parse(SAMPLE).unwrap();
        assert_eq!(file.schemas, vec!["IFC4".to_string()]);
        assert_eq!(file.instances.len(), 14);

        let org = &file.instances[1];
        assert_eq!(org.type_name, "IFCORGANIZATION");
        assert_eq!(org.args[1], StepValue::String("Acme; Inc.".into()));

        let point = &file.instances[5];
        assert_eq!(point.line, 14);
        assert_eq!(
            point.args[0],
            StepValue::List(vec![
                StepValue::Real(0.0),
                StepValue::Real(0.0),
                StepValue::Real(0.001),
            ])
        );
    }

    #[test]
    fn test_parameter_forms() {
        assert_eq!(parameter("$").unwrap().1, StepValue::Null);
        assert_eq!(parameter("*").unwrap().1, StepValue::Derived);
        assert_eq!(parameter("#42").unwrap().1, StepValue::Reference(42));
        assert_eq!(parameter(".T.").unwrap().1, StepValue::Enum("T".into()));
        assert_eq!(parameter("-12").unwrap().1, StepValue::Integer(-12));
        assert_eq!(parameter("2.5E+2").unwrap().1, StepValue::Real(250.0));
        assert_eq!(parameter("\"0FF\"").unwrap().1, StepValue::Binary("0FF".into()));
        assert_eq!(
            parameter("IFCLABEL('x')").unwrap().1,
            StepValue::Typed("IFCLABEL".into(), vec![StepValue::String("x".into())])
        );
    }

    #[test]
    fn test_decode_string() {
        assert_eq!(decode_string(r"Caf\X2\00E9\X0\"), "Café");
        assert_eq!(decode_string(r"\X\E9t\X\E9"), "été");
        assert_eq!(decode_string(r"a\\b"), r"a\b");
        assert_eq!(decode_string(r"plain"), "plain");
        assert_eq!(decode_string(r"\X4\0001F600\X0\!"), "\u{1F600}!");
        assert_eq!(decode_string(r"\PA\Stra\S\_e"), "Straße");
        assert_eq!(decode_string(r"\X2\00E\X0\"), r"\X2\00E\X0\");
        assert_eq!(decode_string(r"C:\dir"), r"C:\dir");
    }

    #[test]
    fn test_load_maps_schema_attributes() {
        let schema = Schema::ifc_core().unwrap();
        let model = load(SAMPLE, &schema).unwrap();

        let wall = model.resolve(21).unwrap();
        assert_eq!(model.type_name(wall).unwrap(), "IfcWall");
        let attributes = model.attributes(wall).unwrap();
        assert_eq!(attributes[2].name, "Name");
        assert_eq!(attributes[2].kind, AttributeKind::Literal(Value::from("Wall é")));
        assert_eq!(
            attributes[1].kind,
            AttributeKind::EntityRef(model.resolve(5))
        );
        assert_eq!(attributes[6].kind, AttributeKind::EntityRef(None));
        assert_eq!(
            attributes[8].kind,
            AttributeKind::Literal(Value::Enum("STANDARD".into()))
        );
    }

    #[test]
    fn test_load_inline_and_unresolved() {
        let schema = Schema::ifc_core().unwrap();
        let model = load(SAMPLE, &schema).unwrap();

        let wall = model.resolve(22).unwrap();
        let placement = match model.attributes(wall).unwrap()[5].kind {
            AttributeKind::EntityRef(Some(h)) => h,
            ref other => panic!("unexpected {:?}", other),
        };
        assert_eq!(model.natural_key(placement).unwrap(), None);
        assert_eq!(model.type_name(placement).unwrap(), "IfcLocalPlacement");
        let origin = model.inline_origin(placement).unwrap().unwrap();
        assert_eq!((origin.parent, origin.attribute.as_str(), origin.index), (wall, "ObjectPlacement", 0));

        let rel = model.resolve(30).unwrap();
        assert_eq!(
            model.attributes(rel).unwrap()[4].kind,
            AttributeKind::AggregateRef(vec![model.resolve(21), Some(wall), None])
        );
    }

    #[test]
    fn test_load_derives_inverses() {
        let schema = Schema::ifc_core().unwrap();
        let model = load(SAMPLE, &schema).unwrap();

        let storey = model.resolve(20).unwrap();
        let names: Vec<String> = model
            .inverse_attributes(storey)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["Decomposes", "ContainsElements"]);

        let person = model.resolve(1).unwrap();
        assert_eq!(
            model.inverse_attributes(person).unwrap(),
            vec![("EngagedIn".to_string(), vec![model.resolve(3).unwrap()])]
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let schema = Schema::ifc_core().unwrap();
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n#1=IFCDIRECTION((1.,0.),$);\nENDSEC;\nEND-ISO-10303-21;\n";
        let err = load(text, &schema).unwrap_err();
        assert!(matches!(
            err,
            ModelReadError::ArityMismatch { key: 1, expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn test_unknown_type_uses_shapes() {
        let schema = Schema::ifc_core().unwrap();
        let text = "ISO-10303-21;\nDATA;\n#1=FOO('a',#2,(#2,#2));\n#2=BAR(.F.);\nENDSEC;\nEND-ISO-10303-21;\n";
        let model = load(text, &schema).unwrap();
        let foo = model.resolve(1).unwrap();
        let bar = model.resolve(2);
        let attributes = model.attributes(foo).unwrap();
        assert_eq!(attributes[0].name, "Arg0");
        assert_eq!(attributes[1].kind, AttributeKind::EntityRef(bar));
        assert_eq!(attributes[2].kind, AttributeKind::AggregateRef(vec![bar, bar]));
        assert_eq!(
            model.attributes(bar.unwrap()).unwrap()[0].kind,
            AttributeKind::Literal(Value::Boolean(false))
        );
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let text = "ISO-10303-21;\nDATA;\n#1=IFCWALL('a';\n";
        match parse(text) {
            Err(ModelReadError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("DATA;").is_err());
    }
}
