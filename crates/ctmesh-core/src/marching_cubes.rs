//! Marching cubes isosurface extraction over a regular grid.
//!
//! The triangle table is the public-domain `MarchingCubeCpp` encoding. Cells are
//! visited in a fixed order and shared edge vertices are cached in a two-slab
//! buffer, so the output is deterministic and contains no duplicated vertices.

#![allow(
    clippy::unreadable_literal,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

use glam::Vec3;

/// Triangle mesh produced by [`marching_cubes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoMesh {
    /// Vertex positions in grid-index space, in field axis order.
    pub vertices: Vec<Vec3>,
    /// Triangles as vertex index triples, in extraction order.
    pub triangles: Vec<[u32; 3]>,
}

impl IsoMesh {
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// One cube edge: endpoint corners, the axis it runs along, and the offset of
/// its start node relative to the cell origin.
struct CellEdge {
    corners: (usize, usize),
    axis: usize,
    offset: [u32; 3],
}

/// Corner `c` of a cell sits at offset `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`.
const CELL_EDGES: [CellEdge; 12] = [
    CellEdge { corners: (0, 1), axis: 0, offset: [0, 0, 0] },
    CellEdge { corners: (2, 3), axis: 0, offset: [0, 1, 0] },
    CellEdge { corners: (4, 5), axis: 0, offset: [0, 0, 1] },
    CellEdge { corners: (6, 7), axis: 0, offset: [0, 1, 1] },
    CellEdge { corners: (0, 2), axis: 1, offset: [0, 0, 0] },
    CellEdge { corners: (1, 3), axis: 1, offset: [1, 0, 0] },
    CellEdge { corners: (4, 6), axis: 1, offset: [0, 0, 1] },
    CellEdge { corners: (5, 7), axis: 1, offset: [1, 0, 1] },
    CellEdge { corners: (0, 4), axis: 2, offset: [0, 0, 0] },
    CellEdge { corners: (1, 5), axis: 2, offset: [1, 0, 0] },
    CellEdge { corners: (2, 6), axis: 2, offset: [0, 1, 0] },
    CellEdge { corners: (3, 7), axis: 2, offset: [1, 1, 0] },
];

/// Extracts the isosurface `field == isoval` using marching cubes.
///
/// `field` is C-contiguous over `dims = [n0, n1, n2]`: the node `(i, j, k)` is
/// stored at `(i * n1 + j) * n2 + k`. Nodes with `value < isoval` are inside.
/// Output vertex components follow the same `(i, j, k)` order and are in
/// grid-index units; callers scale them by the grid spacing.
///
/// # Panics
/// Panics if `field.len()` does not match `dims` or if any dimension is below 2.
#[must_use]
pub fn marching_cubes(field: &[f32], isoval: f32, dims: [u32; 3]) -> IsoMesh {
    let [n0, n1, n2] = dims;
    let expected = (n0 as usize) * (n1 as usize) * (n2 as usize);
    assert!(
        field.len() == expected,
        "Field size {} does not match dimensions {n0}x{n1}x{n2} = {expected}",
        field.len(),
    );
    assert!(n0 >= 2 && n1 >= 2 && n2 >= 2, "All dimensions must be >= 2");

    let mut mesh = IsoMesh::default();

    // Vertex index for each of the three axis edges starting at a node, for the
    // two most recent k-layers.
    let mut slab: Vec<[u32; 3]> = vec![[0; 3]; (n0 as usize) * (n1 as usize) * 2];
    let mut vs = [0.0_f32; 8];
    let mut edge_vertex = [0_u32; 12];

    for k in 0..n2 - 1 {
        for j in 0..n1 - 1 {
            for i in 0..n0 - 1 {
                let cell = [i, j, k];
                let mut config = 0_usize;
                for (c, value) in vs.iter_mut().enumerate() {
                    let node = corner_node(cell, c);
                    *value = field[field_index(node, dims)] - isoval;
                    if *value < 0.0 {
                        config |= 1 << c;
                    }
                }

                if config == 0 || config == 255 {
                    continue;
                }

                for (e, edge) in CELL_EDGES.iter().enumerate() {
                    let start = [
                        cell[0] + edge.offset[0],
                        cell[1] + edge.offset[1],
                        cell[2] + edge.offset[2],
                    ];
                    if owns_edge(cell, edge) {
                        let (va, vb) = (vs[edge.corners.0], vs[edge.corners.1]);
                        if (va < 0.0) != (vb < 0.0) {
                            let mut v =
                                Vec3::new(start[0] as f32, start[1] as f32, start[2] as f32);
                            v[edge.axis] += va / (va - vb);
                            slab[slab_index(start, dims)][edge.axis] = mesh.vertices.len() as u32;
                            mesh.vertices.push(v);
                        }
                    }
                    edge_vertex[e] = slab[slab_index(start, dims)][edge.axis];
                }

                let entry = MC_TRIS[config];
                let n_triangles = (entry & 0xF) as usize;
                let mut shift = 4;
                for _ in 0..n_triangles {
                    let mut tri = [0_u32; 3];
                    for slot in &mut tri {
                        *slot = edge_vertex[((entry >> shift) & 0xF) as usize];
                        shift += 4;
                    }
                    mesh.triangles.push(tri);
                }
            }
        }
    }

    mesh
}

/// Whether `cell` is the first visited cell touching `edge`; otherwise the edge
/// vertex was already computed by a neighbor.
#[inline]
fn owns_edge(cell: [u32; 3], edge: &CellEdge) -> bool {
    (0..3)
        .filter(|&axis| axis != edge.axis)
        .all(|axis| edge.offset[axis] == 1 || cell[axis] == 0)
}

#[inline]
fn corner_node(cell: [u32; 3], corner: usize) -> [u32; 3] {
    [
        cell[0] + (corner & 1) as u32,
        cell[1] + ((corner >> 1) & 1) as u32,
        cell[2] + ((corner >> 2) & 1) as u32,
    ]
}

/// Layout: `(i * n1 + j) * n2 + k`
#[inline]
fn field_index(node: [u32; 3], dims: [u32; 3]) -> usize {
    ((node[0] as usize) * (dims[1] as usize) + node[1] as usize) * (dims[2] as usize)
        + node[2] as usize
}

/// Layout: `n0 * n1 * (k % 2) + j * n0 + i`
#[inline]
fn slab_index(node: [u32; 3], dims: [u32; 3]) -> usize {
    (dims[0] as usize) * (dims[1] as usize) * ((node[2] as usize) % 2)
        + (node[1] as usize) * (dims[0] as usize)
        + node[0] as usize
}

/// Look-up table for triangle configurations (256 entries, one per cube configuration).
///
/// Each entry is a `u64` encoding:
/// - Bits `[3:0]`: Number of triangles (0-5)
/// - Bits `[7:4]`, `[11:8]`, ...: Edge indices (0-11) for each triangle vertex, 4 bits each
///
/// Ported from `MarchingCubeCpp` (public domain).
#[rustfmt::skip]
static MC_TRIS: [u64; 256] = [
    0, 33793, 36945, 159668546,
    18961, 144771090, 5851666, 595283255635,
    20913, 67640146, 193993474, 655980856339,
    88782242, 736732689667, 797430812739, 194554754,
    26657, 104867330, 136709522, 298069416227,
    109224258, 8877909667, 318136408323, 1567994331701604,
    189884450, 350847647843, 559958167731, 3256298596865604,
    447393122899, 651646838401572, 2538311371089956, 737032694307,
    29329, 43484162, 91358498, 374810899075,
    158485010, 178117478419, 88675058979, 433581536604804,
    158486962, 649105605635, 4866906995, 3220959471609924,
    649165714851, 3184943915608436, 570691368417972, 595804498035,
    124295042, 431498018963, 508238522371, 91518530,
    318240155763, 291789778348404, 1830001131721892, 375363605923,
    777781811075, 1136111028516116, 3097834205243396, 508001629971,
    2663607373704004, 680242583802939237, 333380770766129845, 179746658,
    42545, 138437538, 93365810, 713842853011,
    73602098, 69575510115, 23964357683, 868078761575828,
    28681778, 713778574611, 250912709379, 2323825233181284,
    302080811955, 3184439127991172, 1694042660682596, 796909779811,
    176306722, 150327278147, 619854856867, 1005252473234484,
    211025400963, 36712706, 360743481544788, 150627258963,
    117482600995, 1024968212107700, 2535169275963444, 4734473194086550421,
    628107696687956, 9399128243, 5198438490361643573, 194220594,
    104474994, 566996932387, 427920028243, 2014821863433780,
    492093858627, 147361150235284, 2005882975110676, 9671606099636618005,
    777701008947, 3185463219618820, 482784926917540, 2900953068249785909,
    1754182023747364, 4274848857537943333, 13198752741767688709, 2015093490989156,
    591272318771, 2659758091419812, 1531044293118596, 298306479155,
    408509245114388, 210504348563, 9248164405801223541, 91321106,
    2660352816454484, 680170263324308757, 8333659837799955077, 482966828984116,
    4274926723105633605, 3184439197724820, 192104450, 15217,
    45937, 129205250, 129208402, 529245952323,
    169097138, 770695537027, 382310500883, 2838550742137652,
    122763026, 277045793139, 81608128403, 1991870397907988,
    362778151475, 2059003085103236, 2132572377842852, 655681091891,
    58419234, 239280858627, 529092143139, 1568257451898804,
    447235128115, 679678845236084, 2167161349491220, 1554184567314086709,
    165479003923, 1428768988226596, 977710670185060, 10550024711307499077,
    1305410032576132, 11779770265620358997, 333446212255967269, 978168444447012,
    162736434, 35596216627, 138295313843, 891861543990356,
    692616541075, 3151866750863876, 100103641866564, 6572336607016932133,
    215036012883, 726936420696196, 52433666, 82160664963,
    2588613720361524, 5802089162353039525, 214799000387, 144876322,
    668013605731, 110616894681956, 1601657732871812, 430945547955,
    3156382366321172, 7644494644932993285, 3928124806469601813, 3155990846772900,
    339991010498708, 10743689387941597493, 5103845475, 105070898,
    3928064910068824213, 156265010, 1305138421793636, 27185,
    195459938, 567044449971, 382447549283, 2175279159592324,
    443529919251, 195059004769796, 2165424908404116, 1554158691063110021,
    504228368803, 1436350466655236, 27584723588724, 1900945754488837749,
    122971970, 443829749251, 302601798803, 108558722,
    724700725875, 43570095105972, 2295263717447940, 2860446751369014181,
    2165106202149444, 69275726195, 2860543885641537797, 2165106320445780,
    2280890014640004, 11820349930268368933, 8721082628082003989, 127050770,
    503707084675, 122834978, 2538193642857604, 10129,
    801441490467, 2923200302876740, 1443359556281892, 2901063790822564949,
    2728339631923524, 7103874718248233397, 12775311047932294245, 95520290,
    2623783208098404, 1900908618382410757, 137742672547, 2323440239468964,
    362478212387, 727199575803140, 73425410, 34337,
    163101314, 668566030659, 801204361987, 73030562,
    591509145619, 162574594, 100608342969108, 5553,
    724147968595, 1436604830452292, 176259090, 42001,
    143955266, 2385, 18433, 0,
];
