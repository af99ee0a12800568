//! Import and export of the 3DGS PLY layout.
//!
//! Properties are resolved by name, so files written by other tools with
//! reordered or extra properties load fine. Export always writes
//! `binary_little_endian` floats in a fixed order.

use std::io::Write;

use foldhash::HashMap;
use foldhash::HashMapExt;
use log::warn;

use crate::cloud::GaussianCloud;
use crate::common::{degree_for_dim, dim_for_degree};
use crate::error::{Result, SpzError};
use crate::options::PlyWriteOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "char" | "int8" => Some(ScalarType::Char),
            "uchar" | "uint8" => Some(ScalarType::UChar),
            "short" | "int16" => Some(ScalarType::Short),
            "ushort" | "uint16" => Some(ScalarType::UShort),
            "int" | "int32" => Some(ScalarType::Int),
            "uint" | "uint32" => Some(ScalarType::UInt),
            "float" | "float32" => Some(ScalarType::Float),
            "double" | "float64" => Some(ScalarType::Double),
            _ => None,
        }
    }

    fn byte_size(self) -> usize {
        match self {
            ScalarType::Char | ScalarType::UChar => 1,
            ScalarType::Short | ScalarType::UShort => 2,
            ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
            ScalarType::Double => 8,
        }
    }

    /// Reads one value; `bytes` holds at least `byte_size()` bytes.
    fn read(self, bytes: &[u8], big_endian: bool) -> f32 {
        macro_rules! read_as {
            ($t:ty) => {{
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                if big_endian {
                    <$t>::from_be_bytes(buf) as f32
                } else {
                    <$t>::from_le_bytes(buf) as f32
                }
            }};
        }

        match self {
            ScalarType::Char => read_as!(i8),
            ScalarType::UChar => read_as!(u8),
            ScalarType::Short => read_as!(i16),
            ScalarType::UShort => read_as!(u16),
            ScalarType::Int => read_as!(i32),
            ScalarType::UInt => read_as!(u32),
            ScalarType::Float => read_as!(f32),
            ScalarType::Double => read_as!(f64),
        }
    }
}

#[derive(Debug, Clone)]
enum PropertyKind {
    Scalar(ScalarType),
    List,
}

#[derive(Debug, Clone)]
struct PlyProperty {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone)]
struct PlyElement {
    name: String,
    count: usize,
    properties: Vec<PlyProperty>,
}

impl PlyElement {
    fn has_lists(&self) -> bool {
        self.properties
            .iter()
            .any(|p| matches!(p.kind, PropertyKind::List))
    }

    /// Bytes per instance in a binary body, if every property is a scalar.
    fn binary_stride(&self) -> Option<usize> {
        self.properties
            .iter()
            .map(|p| match p.kind {
                PropertyKind::Scalar(ty) => Some(ty.byte_size()),
                PropertyKind::List => None,
            })
            .sum()
    }
}

#[derive(Debug)]
struct PlyHeader {
    format: PlyFormat,
    elements: Vec<PlyElement>,
    body_offset: usize,
}

#[inline]
fn next_line<'b>(buffer: &'b [u8], offset: &mut usize) -> Option<&'b [u8]> {
    if *offset >= buffer.len() {
        return None;
    }
    let start = *offset;

    let line = match memchr::memchr(b'\n', &buffer[*offset..]) {
        Some(pos) => {
            *offset = start + pos + 1;
            &buffer[start..start + pos]
        }
        None => {
            *offset = buffer.len();
            &buffer[start..]
        }
    };
    Some(line.strip_suffix(b"\r").unwrap_or(line))
}

fn parse_err(msg: impl Into<String>) -> SpzError {
    SpzError::ParsePly(msg.into())
}

#[inline(never)]
fn parse_header(raw_data: &[u8]) -> Result<PlyHeader> {
    let mut offset = 0;

    let magic = next_line(raw_data, &mut offset).ok_or_else(|| parse_err("No 'ply' line"))?;
    if magic != b"ply" {
        return Err(parse_err("Not a .ply file (missing 'ply' header)"));
    }

    let mut format = None;
    let mut elements: Vec<PlyElement> = Vec::new();
    loop {
        let line = next_line(raw_data, &mut offset)
            .ok_or_else(|| parse_err("No 'end_header' found before EOF"))?;
        let line = std::str::from_utf8(line)
            .map_err(|e| parse_err(format!("UTF-8 error in header: {}", e)))?;
        let mut words = line.split_whitespace();

        match words.next() {
            Some("end_header") => break,
            Some("comment") | Some("obj_info") | None => {}
            Some("format") => {
                format = Some(match words.next() {
                    Some("ascii") => PlyFormat::Ascii,
                    Some("binary_little_endian") => PlyFormat::BinaryLittleEndian,
                    Some("binary_big_endian") => PlyFormat::BinaryBigEndian,
                    other => {
                        return Err(SpzError::UnsupportedPly(format!(
                            "Unknown format: {:?}",
                            other
                        )))
                    }
                });
            }
            Some("element") => {
                let (Some(name), Some(count)) = (words.next(), words.next()) else {
                    return Err(parse_err(format!("Invalid element line: {}", line)));
                };
                let count = count
                    .parse::<usize>()
                    .map_err(|e| parse_err(format!("Invalid element count '{}': {}", count, e)))?;
                elements.push(PlyElement {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| parse_err("Property declared before any element"))?;
                let ty = words
                    .next()
                    .ok_or_else(|| parse_err(format!("Invalid property line: {}", line)))?;
                let kind = if ty == "list" {
                    // list <count type> <item type> <name>
                    words.next();
                    words.next();
                    PropertyKind::List
                } else {
                    let ty = ScalarType::parse(ty).ok_or_else(|| {
                        SpzError::UnsupportedPly(format!("Unknown property type: {}", ty))
                    })?;
                    PropertyKind::Scalar(ty)
                };
                let name = words
                    .next()
                    .ok_or_else(|| parse_err(format!("Property without a name: {}", line)))?;
                element.properties.push(PlyProperty {
                    name: name.to_string(),
                    kind,
                });
            }
            Some(other) => {
                return Err(parse_err(format!("Unexpected header keyword: {}", other)));
            }
        }
    }

    Ok(PlyHeader {
        format: format.ok_or_else(|| parse_err("Missing format line"))?,
        elements,
        body_offset: offset,
    })
}

/// Decodes every vertex row into floats, in declared property order.
fn read_vertex_rows(
    raw_data: &[u8],
    header: &PlyHeader,
    vertex_idx: usize,
) -> Result<Vec<f32>> {
    let vertex = &header.elements[vertex_idx];
    let fields = vertex.properties.len();
    let mut rows = Vec::new();

    match header.format {
        PlyFormat::Ascii => {
            let body = std::str::from_utf8(&raw_data[header.body_offset..])
                .map_err(|e| parse_err(format!("UTF-8 error in body: {}", e)))?;
            let skip = header.elements[..vertex_idx]
                .iter()
                .try_fold(0usize, |acc, e| acc.checked_add(e.count))
                .ok_or_else(|| parse_err("Overflow in element line count"))?;
            let mut lines = body.lines().filter(|l| !l.trim().is_empty()).skip(skip);
            for i in 0..vertex.count {
                let line = lines.next().ok_or_else(|| {
                    parse_err(format!(
                        "Expected {} vertices, found {}",
                        vertex.count, i
                    ))
                })?;
                let before = rows.len();
                for token in line.split_whitespace().take(fields) {
                    let value: f64 = token
                        .parse()
                        .map_err(|e| parse_err(format!("Invalid value '{}': {}", token, e)))?;
                    rows.push(value as f32);
                }
                if rows.len() - before != fields {
                    return Err(parse_err(format!(
                        "Vertex {} has {} values, expected {}",
                        i,
                        rows.len() - before,
                        fields
                    )));
                }
            }
        }
        PlyFormat::BinaryLittleEndian | PlyFormat::BinaryBigEndian => {
            let big_endian = header.format == PlyFormat::BinaryBigEndian;
            let mut start = header.body_offset;
            for element in &header.elements[..vertex_idx] {
                let stride = element.binary_stride().ok_or_else(|| {
                    SpzError::UnsupportedPly(format!(
                        "Element '{}' with list properties precedes the vertex data",
                        element.name
                    ))
                })?;
                start = element
                    .count
                    .checked_mul(stride)
                    .and_then(|n| n.checked_add(start))
                    .ok_or_else(|| parse_err("Overflow in byte calculation"))?;
            }

            let stride = vertex
                .binary_stride()
                .ok_or_else(|| parse_err("Vertex stride unavailable"))?;
            let expected_bytes = vertex
                .count
                .checked_mul(stride)
                .ok_or_else(|| parse_err("Overflow in byte calculation"))?;
            let available = raw_data.len().saturating_sub(start);
            if available < expected_bytes {
                return Err(SpzError::Truncated {
                    needed: expected_bytes,
                    available,
                });
            }

            let layout: Vec<(usize, ScalarType)> = vertex
                .properties
                .iter()
                .scan(0usize, |offset, p| {
                    let PropertyKind::Scalar(ty) = p.kind else {
                        return None;
                    };
                    let field = (*offset, ty);
                    *offset += ty.byte_size();
                    Some(field)
                })
                .collect();

            rows.reserve(vertex.count * fields);
            let data = &raw_data[start..start + expected_bytes];
            for vertex_data in data.chunks_exact(stride) {
                for &(offset, ty) in &layout {
                    rows.push(ty.read(&vertex_data[offset..], big_endian));
                }
            }
        }
    }

    Ok(rows)
}

#[inline(always)]
fn idx_of(hm: &HashMap<&str, usize>, name: &str) -> Result<usize> {
    hm.get(name)
        .cloned()
        .ok_or_else(|| SpzError::MissingProperty(name.to_string()))
}

/// Returns property indices of `f_rest_0..n` where `n` is one past the
/// highest index present.
fn sh_rest_indices(field_map: &HashMap<&str, usize>) -> Result<Vec<usize>> {
    let highest = field_map
        .keys()
        .filter_map(|name| name.strip_prefix("f_rest_"))
        .filter_map(|suffix| suffix.parse::<usize>().ok())
        .max();
    let Some(highest) = highest else {
        return Ok(Vec::new());
    };

    let sh_idx = (0..=highest)
        .map(|i| idx_of(field_map, &format!("f_rest_{}", i)))
        .collect::<Result<Vec<_>>>()?;
    if sh_idx.len() % 3 != 0 {
        return Err(parse_err(format!(
            "Incomplete spherical harmonics fields: {} is not a multiple of 3",
            sh_idx.len()
        )));
    }
    Ok(sh_idx)
}

#[inline(never)]
pub fn load_splat_from_ply(raw_data: &[u8]) -> Result<GaussianCloud> {
    let header = parse_header(raw_data)?;

    let vertex_idx = header
        .elements
        .iter()
        .position(|e| e.name == "vertex")
        .ok_or_else(|| parse_err("Missing 'element vertex' definition"))?;
    let vertex = &header.elements[vertex_idx];
    if vertex.has_lists() {
        return Err(SpzError::UnsupportedPly(
            "List properties in the vertex element".to_string(),
        ));
    }
    let num_points = vertex.count;
    if num_points == 0 {
        return Err(SpzError::EmptyCloud);
    }

    // Build field map
    let mut field_map: HashMap<&str, usize> = HashMap::with_capacity(vertex.properties.len());
    for (i, p) in vertex.properties.iter().enumerate() {
        field_map.insert(p.name.as_str(), i);
    }

    // Retrieve field indices
    let ix = idx_of(&field_map, "x")?;
    let iy = idx_of(&field_map, "y")?;
    let iz = idx_of(&field_map, "z")?;
    let is0 = idx_of(&field_map, "scale_0")?;
    let is1 = idx_of(&field_map, "scale_1")?;
    let is2 = idx_of(&field_map, "scale_2")?;
    let ir0 = idx_of(&field_map, "rot_0")?;
    let ir1 = idx_of(&field_map, "rot_1")?;
    let ir2 = idx_of(&field_map, "rot_2")?;
    let ir3 = idx_of(&field_map, "rot_3")?;
    let iop = idx_of(&field_map, "opacity")?;
    let ic0 = idx_of(&field_map, "f_dc_0")?;
    let ic1 = idx_of(&field_map, "f_dc_1")?;
    let ic2 = idx_of(&field_map, "f_dc_2")?;

    let sh_idx = sh_rest_indices(&field_map)?;
    let file_sh_dim = sh_idx.len() / 3;
    let sh_degree = degree_for_dim(file_sh_dim);
    let sh_dim = dim_for_degree(sh_degree);
    if sh_dim < file_sh_dim {
        warn!(
            "Dropping {} SH coefficients beyond degree {}",
            (file_sh_dim - sh_dim) * 3,
            sh_degree
        );
    }

    let known = 14 + sh_idx.len();
    if field_map.len() > known {
        log::debug!(
            "Ignoring {} unknown vertex properties",
            field_map.len() - known
        );
    }

    let rows = read_vertex_rows(raw_data, &header, vertex_idx)?;
    let fields_per_vertex = vertex.properties.len();

    let mut cloud = GaussianCloud {
        num_points,
        sh_degree,
        antialiased: false,
        positions: Vec::with_capacity(num_points * 3),
        scales: Vec::with_capacity(num_points * 3),
        rotations: Vec::with_capacity(num_points * 4),
        alphas: Vec::with_capacity(num_points),
        colors: Vec::with_capacity(num_points * 3),
        sh: Vec::with_capacity(num_points * sh_dim * 3),
    };

    // f_rest is stored channel-major in the file, the cloud interleaves RGB.
    let sh_indices: Vec<_> = (0..sh_dim)
        .map(|j| {
            (
                sh_idx[j],
                sh_idx[j + file_sh_dim],
                sh_idx[j + 2 * file_sh_dim],
            )
        })
        .collect();

    for v in rows.chunks_exact(fields_per_vertex) {
        cloud.positions.extend_from_slice(&[v[ix], v[iy], v[iz]]);
        cloud.scales.extend_from_slice(&[v[is0], v[is1], v[is2]]);
        // rot_0 is w
        cloud
            .rotations
            .extend_from_slice(&[v[ir1], v[ir2], v[ir3], v[ir0]]);
        cloud.alphas.push(v[iop]);
        cloud.colors.extend_from_slice(&[v[ic0], v[ic1], v[ic2]]);
        for &(r, g, b) in &sh_indices {
            cloud.sh.extend_from_slice(&[v[r], v[g], v[b]]);
        }
    }

    Ok(cloud)
}

#[inline(never)]
pub fn save_splat_to_ply(cloud: &GaussianCloud, options: &PlyWriteOptions) -> Result<Vec<u8>> {
    cloud.validate()?;

    let num_points = cloud.num_points;
    let sh_dim = cloud.sh_dim();
    let include_normals = options.include_normals;

    let mut output = Vec::new();
    output.extend_from_slice(b"ply\nformat binary_little_endian 1.0\n");
    writeln!(output, "element vertex {}", num_points)?;
    output.extend_from_slice(b"property float x\nproperty float y\nproperty float z\n");
    if include_normals {
        output.extend_from_slice(b"property float nx\nproperty float ny\nproperty float nz\n");
    }
    output.extend_from_slice(
        b"property float scale_0\nproperty float scale_1\nproperty float scale_2\n\
          property float rot_0\nproperty float rot_1\nproperty float rot_2\nproperty float rot_3\n\
          property float opacity\n\
          property float f_dc_0\nproperty float f_dc_1\nproperty float f_dc_2\n",
    );
    for i in 0..(sh_dim * 3) {
        writeln!(output, "property float f_rest_{}", i)?;
    }
    output.extend_from_slice(b"end_header\n");

    let floats_per_point = 3 + if include_normals { 3 } else { 0 } + 3 + 4 + 1 + 3 + sh_dim * 3;
    output.reserve(num_points * floats_per_point * 4);

    let mut row = Vec::with_capacity(floats_per_point);
    for i in 0..num_points {
        row.clear();
        row.extend_from_slice(&cloud.positions[i * 3..i * 3 + 3]);
        if include_normals {
            row.extend_from_slice(&[0.0; 3]);
        }
        row.extend_from_slice(&cloud.scales[i * 3..i * 3 + 3]);
        // Rotations (w, x, y, z)
        row.extend_from_slice(&[
            cloud.rotations[i * 4 + 3],
            cloud.rotations[i * 4],
            cloud.rotations[i * 4 + 1],
            cloud.rotations[i * 4 + 2],
        ]);
        row.push(cloud.alphas[i]);
        row.extend_from_slice(&cloud.colors[i * 3..i * 3 + 3]);
        for color_channel in 0..3 {
            for j in 0..sh_dim {
                row.push(cloud.sh[(i * sh_dim + j) * 3 + color_channel]);
            }
        }

        for value in &row {
            output.extend_from_slice(&value.to_le_bytes());
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn create_test_ply() -> Vec<u8> {
        // minimal .ply with 1 vertex:
        let header = b"ply
format binary_little_endian 1.0
element vertex 1
property float x
property float y
property float z
property float scale_0
property float scale_1
property float scale_2
property float rot_0
property float rot_1
property float rot_2
property float rot_3
property float opacity
property float f_dc_0
property float f_dc_1
property float f_dc_2
end_header
";

        #[rustfmt::skip]
        let floats = [
            // x, y, z
            0.0f32, 0.1, 0.2,
            // scale_0, scale_1, scale_2
            0.01, 0.02, 0.03,
            // rot_0, rot_1, rot_2, rot_3
            1.0, 0.0, 0.0, 0.0,
            // opacity
            0.5,
            // f_dc_0, f_dc_1, f_dc_2
            0.2, 0.3, 0.4,
        ];

        let mut raw_ply = Vec::new();
        raw_ply.extend_from_slice(header);
        for &f in &floats {
            raw_ply.extend_from_slice(&f.to_le_bytes());
        }
        raw_ply
    }

    #[test]
    fn test_empty_ply_is_rejected() {
        // minimal .ply, 0 vertices, no trailing newline
        let data =
            b"ply\nformat binary_little_endian 1.0\nelement vertex 0\nproperty float x\nend_header";
        assert_matches!(load_splat_from_ply(data), Err(SpzError::EmptyCloud));
    }

    #[test]
    fn test_parse_minimal_ply() {
        let cloud = load_splat_from_ply(&create_test_ply()).expect("parse failed");
        assert_eq!(cloud.num_points, 1);
        assert_eq!(cloud.sh_degree, 0);
        assert_eq!(cloud.positions, vec![0.0, 0.1, 0.2]);
        assert_eq!(cloud.scales, vec![0.01, 0.02, 0.03]);
        assert_eq!(cloud.rotations, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(cloud.alphas, vec![0.5]);
        assert_eq!(cloud.colors, vec![0.2, 0.3, 0.4]);
        assert!(cloud.sh.is_empty());
        assert!(cloud.validate().is_ok());
    }

    #[test]
    fn test_crlf_header_and_comments() {
        let raw = create_test_ply();
        let split = raw
            .windows(11)
            .position(|w| w == b"end_header\n")
            .unwrap();
        let head = std::str::from_utf8(&raw[..split]).unwrap();
        let body = &raw[split + 11..];

        let mut data = head
            .replace(
                "format binary_little_endian 1.0\n",
                "format binary_little_endian 1.0\ncomment written by a test\n",
            )
            .replace('\n', "\r\n")
            .into_bytes();
        data.extend_from_slice(b"end_header\r\n");
        data.extend_from_slice(body);

        let cloud = load_splat_from_ply(&data).expect("parse failed");
        assert_eq!(cloud.colors, vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_missing_mandatory_property() {
        let data = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\n\
property float x\nproperty float y\nproperty float z\nproperty float opacity\n\
property float f_dc_0\nproperty float f_dc_1\nproperty float f_dc_2\nend_header\n";
        let mut raw = data.to_vec();
        raw.extend_from_slice(&[0u8; 7 * 4]);
        assert_matches!(
            load_splat_from_ply(&raw),
            Err(SpzError::MissingProperty(name)) if name == "scale_0"
        );
    }

    #[test]
    fn test_truncated_body() {
        let mut raw = create_test_ply();
        raw.truncate(raw.len() - 3);
        assert_matches!(
            load_splat_from_ply(&raw),
            Err(SpzError::Truncated { needed: 56, available: 53 })
        );
    }

    #[test]
    fn test_not_a_ply() {
        assert_matches!(load_splat_from_ply(b"solid cube\n"), Err(SpzError::ParsePly(_)));
        assert_matches!(load_splat_from_ply(b""), Err(SpzError::ParsePly(_)));
        assert_matches!(
            load_splat_from_ply(b"ply\nformat binary_little_endian 1.0\nelement vertex 1\n"),
            Err(SpzError::ParsePly(_))
        );
        assert_matches!(
            load_splat_from_ply(b"ply\nformat weird 1.0\nend_header\n"),
            Err(SpzError::UnsupportedPly(_))
        );
    }

    #[test]
    fn test_vertex_list_property_is_unsupported() {
        let data = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\n\
property list uchar int idx\nend_header\n";
        assert_matches!(load_splat_from_ply(data), Err(SpzError::UnsupportedPly(_)));
    }

    #[test]
    fn test_ascii_with_reordered_and_extra_properties() {
        let data = "ply
format ascii 1.0
comment reordered
element vertex 2
property float f_dc_2
property float f_dc_1
property float f_dc_0
property float opacity
property uchar red
property float rot_3
property float rot_2
property float rot_1
property float rot_0
property double scale_2
property float scale_1
property float scale_0
property float z
property float y
property float x
element face 1
property list uchar int vertex_indices
end_header
3 2 1 0.5 255 0 0 0 1 -3 -2 -1 9 8 7
6 5 4 -0.5 0 0.5 0.5 0.5 0.5 -6 -5 -4 12 11 10
3 0 1 2
";
        let cloud = load_splat_from_ply(data.as_bytes()).expect("parse failed");
        assert_eq!(cloud.num_points, 2);
        assert_eq!(cloud.positions, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        assert_eq!(cloud.scales, vec![-1.0, -2.0, -3.0, -4.0, -5.0, -6.0]);
        assert_eq!(
            cloud.rotations,
            vec![0.0, 0.0, 0.0, 1.0, 0.5, 0.5, 0.5, 0.5]
        );
        assert_eq!(cloud.alphas, vec![0.5, -0.5]);
        assert_eq!(cloud.colors, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_ascii_preceding_element_counts_overflow() {
        let mut data = String::from(
            "ply\nformat ascii 1.0\n\
             element a 18446744073709551615\nproperty float v\n\
             element b 1\nproperty float v\n\
             element vertex 1\n",
        );
        for name in [
            "x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3",
            "opacity", "f_dc_0", "f_dc_1", "f_dc_2",
        ] {
            data.push_str(&format!("property float {}\n", name));
        }
        data.push_str("end_header\n1\n2\n0 0 0 0 0 0 1 0 0 0 0 0 0 0\n");

        assert_matches!(
            load_splat_from_ply(data.as_bytes()),
            Err(SpzError::ParsePly(msg)) if msg.contains("Overflow")
        );
    }

    #[test]
    fn test_big_endian_body_after_scalar_element() {
        let mut data = b"ply\nformat binary_big_endian 1.0\n\
element camera 1\nproperty int id\n\
element vertex 1\n"
            .to_vec();
        for name in [
            "x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3",
            "opacity", "f_dc_0", "f_dc_1", "f_dc_2",
        ] {
            data.extend_from_slice(format!("property float {}\n", name).as_bytes());
        }
        data.extend_from_slice(b"end_header\n");
        data.extend_from_slice(&42i32.to_be_bytes());
        for i in 0..14 {
            data.extend_from_slice(&(i as f32).to_be_bytes());
        }

        let cloud = load_splat_from_ply(&data).expect("parse failed");
        assert_eq!(cloud.positions, vec![0.0, 1.0, 2.0]);
        assert_eq!(cloud.rotations, vec![7.0, 8.0, 9.0, 6.0]);
        assert_eq!(cloud.colors, vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_sh_degree_inference() {
        let mut cloud = GaussianCloud::with_capacity(1, 1, false);
        cloud.rotations[3] = 1.0;
        for (i, v) in cloud.sh.iter_mut().enumerate() {
            *v = i as f32;
        }
        let ply = save_splat_to_ply(&cloud, &PlyWriteOptions::default()).expect("save failed");
        let text = String::from_utf8_lossy(&ply);
        assert!(text.contains("property float f_rest_8\n"));
        assert!(!text.contains("f_rest_9"));

        let loaded = load_splat_from_ply(&ply).expect("parse failed");
        assert_eq!(loaded.sh_degree, 1);
        assert_eq!(loaded.sh, cloud.sh);
    }

    #[test]
    fn test_sh_extra_coefficients_are_dropped() {
        // 4 coefficients per channel: degree 1 keeps the first 3.
        let mut data = String::from("ply\nformat ascii 1.0\nelement vertex 1\n");
        for name in [
            "x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3",
            "opacity", "f_dc_0", "f_dc_1", "f_dc_2",
        ] {
            data.push_str(&format!("property float {}\n", name));
        }
        for i in 0..12 {
            data.push_str(&format!("property float f_rest_{}\n", i));
        }
        data.push_str("end_header\n");
        let values: Vec<String> = (0..26).map(|i| i.to_string()).collect();
        data.push_str(&values.join(" "));
        data.push('\n');

        let cloud = load_splat_from_ply(data.as_bytes()).expect("parse failed");
        assert_eq!(cloud.sh_degree, 1);
        // f_rest_{c * 4 + j} sits at property 14 + c * 4 + j
        assert_eq!(
            cloud.sh,
            vec![14.0, 18.0, 22.0, 15.0, 19.0, 23.0, 16.0, 20.0, 24.0]
        );
    }

    #[test]
    fn test_sh_gaps_and_partial_triples_are_rejected() {
        let base = "ply\nformat ascii 1.0\nelement vertex 1\n\
property float x\nproperty float y\nproperty float z\n\
property float scale_0\nproperty float scale_1\nproperty float scale_2\n\
property float rot_0\nproperty float rot_1\nproperty float rot_2\nproperty float rot_3\n\
property float opacity\nproperty float f_dc_0\nproperty float f_dc_1\nproperty float f_dc_2\n";

        let gap = format!("{base}property float f_rest_0\nproperty float f_rest_2\nend_header\n");
        assert_matches!(
            load_splat_from_ply(gap.as_bytes()),
            Err(SpzError::MissingProperty(name)) if name == "f_rest_1"
        );

        let partial =
            format!("{base}property float f_rest_0\nproperty float f_rest_1\nend_header\n");
        assert_matches!(
            load_splat_from_ply(partial.as_bytes()),
            Err(SpzError::ParsePly(_))
        );
    }

    #[test]
    fn test_export_property_order() {
        let cloud = load_splat_from_ply(&create_test_ply()).expect("parse failed");
        let ply = save_splat_to_ply(
            &cloud,
            &PlyWriteOptions {
                include_normals: true,
            },
        )
        .expect("save failed");
        let text = String::from_utf8_lossy(&ply);
        let names: Vec<&str> = text
            .lines()
            .take_while(|l| *l != "end_header")
            .filter_map(|l| l.strip_prefix("property float "))
            .collect();
        assert_eq!(
            names,
            vec![
                "x", "y", "z", "nx", "ny", "nz", "scale_0", "scale_1", "scale_2", "rot_0",
                "rot_1", "rot_2", "rot_3", "opacity", "f_dc_0", "f_dc_1", "f_dc_2"
            ]
        );
        assert!(text.contains("element vertex 1\n"));

        let reloaded = load_splat_from_ply(&ply).expect("reparse failed");
        assert_eq!(reloaded, cloud);
    }

    #[test]
    fn test_export_rejects_invalid_cloud() {
        assert_matches!(
            save_splat_to_ply(&GaussianCloud::default(), &PlyWriteOptions::default()),
            Err(SpzError::EmptyCloud)
        );
        let mut cloud = GaussianCloud::with_capacity(3, 0, false);
        cloud.alphas.push(0.0);
        assert_matches!(
            save_splat_to_ply(&cloud, &PlyWriteOptions::default()),
            Err(SpzError::InconsistentCloud { attribute: "alphas", .. })
        );
    }
}
