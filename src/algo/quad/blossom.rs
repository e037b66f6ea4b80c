//! Maximum-weight matching in general graphs.
//!
//! Edmonds' blossom algorithm with primal-dual updates, in the `O(n³)`
//! formulation by Galil. Blossoms are kept in flat index arrays: vertices
//! are `0..n`, blossoms reuse slots `n..2n`. Edge `k` has endpoints `2k`
//! and `2k + 1`, so `p ^ 1` is the opposite endpoint of `p`.
//!
//! Weights are doubled internally, which keeps every dual variable an
//! integer.

/// Sentinel for "no vertex / edge / blossom".
const NONE: usize = usize::MAX;

/// Compute a maximum-weight matching.
///
/// `edges` holds `(u, v, weight)` with `u != v`, both below `num_vertices`.
/// With `max_cardinality`, the result is the maximum-weight matching among
/// those with the largest number of edges.
///
/// Returns the mate of each vertex.
///
/// # Example
///
/// ```
/// use pavemesh::algo::quad::blossom::max_weight_matching;
///
/// // A path a-b-c-d: the two outer edges beat the heavy middle one
/// let mate = max_weight_matching(4, &[(0, 1, 5), (1, 2, 8), (2, 3, 5)], false);
/// assert_eq!(mate, vec![Some(1), Some(0), Some(3), Some(2)]);
/// ```
pub fn max_weight_matching(
    num_vertices: usize,
    edges: &[(usize, usize, i64)],
    max_cardinality: bool,
) -> Vec<Option<usize>> {
    let edges: Vec<(usize, usize, i64)> = edges
        .iter()
        .filter(|&&(u, v, _)| u != v && u < num_vertices && v < num_vertices)
        .map(|&(u, v, w)| (u, v, 2 * w))
        .collect();
    if edges.is_empty() {
        return vec![None; num_vertices];
    }
    let mut matcher = Matcher::new(num_vertices, edges);
    matcher.solve(max_cardinality);
    matcher
        .mate
        .iter()
        .map(|&p| (p != NONE).then(|| matcher.endpoint[p]))
        .collect()
}

struct Matcher {
    nvertex: usize,
    edges: Vec<(usize, usize, i64)>,
    /// Vertex at each edge endpoint.
    endpoint: Vec<usize>,
    /// Remote endpoints of the edges incident to each vertex.
    neighbend: Vec<Vec<usize>>,
    /// Remote endpoint of each vertex's matched edge.
    mate: Vec<usize>,
    /// 0 free, 1 S, 2 T, 5 S and visited by a blossom scan.
    label: Vec<u8>,
    labelend: Vec<usize>,
    inblossom: Vec<usize>,
    blossomparent: Vec<usize>,
    blossomchilds: Vec<Vec<usize>>,
    blossombase: Vec<usize>,
    blossomendps: Vec<Vec<usize>>,
    bestedge: Vec<usize>,
    blossombestedges: Vec<Option<Vec<usize>>>,
    unusedblossoms: Vec<usize>,
    dualvar: Vec<i64>,
    allowedge: Vec<bool>,
    queue: Vec<usize>,
}

/// Wrap a possibly negative child position into `0..len`.
fn at(j: isize, len: usize) -> usize {
    j.rem_euclid(len as isize) as usize
}

impl Matcher {
    fn new(nvertex: usize, edges: Vec<(usize, usize, i64)>) -> Self {
        let maxweight = edges.iter().map(|e| e.2).max().unwrap_or(0).max(0);
        let mut endpoint = Vec::with_capacity(2 * edges.len());
        let mut neighbend = vec![Vec::new(); nvertex];
        for (k, &(i, j, _)) in edges.iter().enumerate() {
            endpoint.push(i);
            endpoint.push(j);
            neighbend[i].push(2 * k + 1);
            neighbend[j].push(2 * k);
        }
        let mut dualvar = vec![maxweight; nvertex];
        dualvar.resize(2 * nvertex, 0);
        let mut blossombase: Vec<usize> = (0..nvertex).collect();
        blossombase.resize(2 * nvertex, NONE);
        let nedge = edges.len();

        Self {
            nvertex,
            edges,
            endpoint,
            neighbend,
            mate: vec![NONE; nvertex],
            label: vec![0; 2 * nvertex],
            labelend: vec![NONE; 2 * nvertex],
            inblossom: (0..nvertex).collect(),
            blossomparent: vec![NONE; 2 * nvertex],
            blossomchilds: vec![Vec::new(); 2 * nvertex],
            blossombase,
            blossomendps: vec![Vec::new(); 2 * nvertex],
            bestedge: vec![NONE; 2 * nvertex],
            blossombestedges: vec![None; 2 * nvertex],
            unusedblossoms: (nvertex..2 * nvertex).collect(),
            dualvar,
            allowedge: vec![false; nedge],
            queue: Vec::new(),
        }
    }

    fn slack(&self, k: usize) -> i64 {
        let (i, j, w) = self.edges[k];
        self.dualvar[i] + self.dualvar[j] - 2 * w
    }

    fn blossom_leaves(&self, b: usize) -> Vec<usize> {
        let mut leaves = Vec::new();
        self.collect_leaves(b, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, b: usize, out: &mut Vec<usize>) {
        if b < self.nvertex {
            out.push(b);
        } else {
            for &t in &self.blossomchilds[b] {
                self.collect_leaves(t, out);
            }
        }
    }

    /// Label the top-level blossom of `w` with `t`, reached through
    /// endpoint `p`. A T-label propagates an S-label to the base's mate.
    fn assign_label(&mut self, mut w: usize, mut t: u8, mut p: usize) {
        loop {
            let b = self.inblossom[w];
            self.label[w] = t;
            self.label[b] = t;
            self.labelend[w] = p;
            self.labelend[b] = p;
            self.bestedge[w] = NONE;
            self.bestedge[b] = NONE;
            if t == 1 {
                let leaves = self.blossom_leaves(b);
                self.queue.extend(leaves);
                return;
            }
            let base = self.blossombase[b];
            let m = self.mate[base];
            w = self.endpoint[m];
            t = 1;
            p = m ^ 1;
        }
    }

    /// Trace back from `v` and `w` to find a new blossom or an augmenting
    /// path. Returns the base of the new blossom, or `NONE`.
    fn scan_blossom(&mut self, mut v: usize, mut w: usize) -> usize {
        let mut path = Vec::new();
        let mut base = NONE;
        while v != NONE || w != NONE {
            let mut b = self.inblossom[v];
            if self.label[b] & 4 != 0 {
                base = self.blossombase[b];
                break;
            }
            path.push(b);
            self.label[b] = 5;
            if self.labelend[b] == NONE {
                v = NONE;
            } else {
                v = self.endpoint[self.labelend[b]];
                b = self.inblossom[v];
                v = self.endpoint[self.labelend[b]];
            }
            if w != NONE {
                std::mem::swap(&mut v, &mut w);
            }
        }
        for b in path {
            self.label[b] = 1;
        }
        base
    }

    /// Contract the cycle closed by edge `k` into a blossom with `base`.
    fn add_blossom(&mut self, base: usize, k: usize) {
        let (mut v, mut w, _) = self.edges[k];
        let bb = self.inblossom[base];
        let mut bv = self.inblossom[v];
        let mut bw = self.inblossom[w];
        let Some(b) = self.unusedblossoms.pop() else {
            return;
        };
        self.blossombase[b] = base;
        self.blossomparent[b] = NONE;
        self.blossomparent[bb] = b;

        let mut path = Vec::new();
        let mut endps = Vec::new();
        while bv != bb {
            self.blossomparent[bv] = b;
            path.push(bv);
            endps.push(self.labelend[bv]);
            v = self.endpoint[self.labelend[bv]];
            bv = self.inblossom[v];
        }
        path.push(bb);
        path.reverse();
        endps.reverse();
        endps.push(2 * k);
        while bw != bb {
            self.blossomparent[bw] = b;
            path.push(bw);
            endps.push(self.labelend[bw] ^ 1);
            w = self.endpoint[self.labelend[bw]];
            bw = self.inblossom[w];
        }

        self.label[b] = 1;
        self.labelend[b] = self.labelend[bb];
        self.dualvar[b] = 0;
        self.blossomchilds[b] = path.clone();
        self.blossomendps[b] = endps;
        for leaf in self.blossom_leaves(b) {
            if self.label[self.inblossom[leaf]] == 2 {
                self.queue.push(leaf);
            }
            self.inblossom[leaf] = b;
        }

        // Least-slack edges from the new blossom to each neighboring S-blossom
        let mut bestedgeto = vec![NONE; 2 * self.nvertex];
        for &sub in &path {
            let nblists: Vec<Vec<usize>> = match self.blossombestedges[sub].take() {
                Some(list) => vec![list],
                None => self
                    .blossom_leaves(sub)
                    .into_iter()
                    .map(|leaf| self.neighbend[leaf].iter().map(|p| p / 2).collect())
                    .collect(),
            };
            for nblist in nblists {
                for k in nblist {
                    let (i, j, _) = self.edges[k];
                    let j = if self.inblossom[j] == b { i } else { j };
                    let bj = self.inblossom[j];
                    if bj != b
                        && self.label[bj] == 1
                        && (bestedgeto[bj] == NONE || self.slack(k) < self.slack(bestedgeto[bj]))
                    {
                        bestedgeto[bj] = k;
                    }
                }
            }
            self.bestedge[sub] = NONE;
        }
        let best: Vec<usize> = bestedgeto.into_iter().filter(|&k| k != NONE).collect();
        self.bestedge[b] = NONE;
        for &k in &best {
            if self.bestedge[b] == NONE || self.slack(k) < self.slack(self.bestedge[b]) {
                self.bestedge[b] = k;
            }
        }
        self.blossombestedges[b] = Some(best);
    }

    /// Undo blossom `b`, relabeling its children when it is a T-blossom
    /// expanded mid-stage.
    fn expand_blossom(&mut self, b: usize, endstage: bool) {
        let childs = self.blossomchilds[b].clone();
        for &s in &childs {
            self.blossomparent[s] = NONE;
            if s < self.nvertex {
                self.inblossom[s] = s;
            } else if endstage && self.dualvar[s] == 0 {
                self.expand_blossom(s, endstage);
            } else {
                for leaf in self.blossom_leaves(s) {
                    self.inblossom[leaf] = s;
                }
            }
        }

        if !endstage && self.label[b] == 2 {
            let endps = self.blossomendps[b].clone();
            let len = childs.len();
            let entrychild = self.inblossom[self.endpoint[self.labelend[b] ^ 1]];
            let mut j = childs.iter().position(|&c| c == entrychild).unwrap_or(0) as isize;
            let (jstep, endptrick): (isize, usize) = if j & 1 != 0 {
                j -= len as isize;
                (1, 0)
            } else {
                (-1, 1)
            };

            // Relabel the even-length path from the entry child to the base
            let mut p = self.labelend[b];
            while j != 0 {
                let q = self.endpoint[p ^ 1];
                self.label[q] = 0;
                let e = endps[at(j - endptrick as isize, len)];
                let r = self.endpoint[e ^ endptrick ^ 1];
                self.label[r] = 0;
                self.assign_label(q, 2, p);
                self.allowedge[e / 2] = true;
                j += jstep;
                p = endps[at(j - endptrick as isize, len)] ^ endptrick;
                self.allowedge[p / 2] = true;
                j += jstep;
            }
            let bv = childs[at(j, len)];
            let q = self.endpoint[p ^ 1];
            self.label[q] = 2;
            self.label[bv] = 2;
            self.labelend[q] = p;
            self.labelend[bv] = p;
            self.bestedge[bv] = NONE;
            j += jstep;

            // Children on the odd path lose their labels unless reachable
            while childs[at(j, len)] != entrychild {
                let bv = childs[at(j, len)];
                if self.label[bv] == 1 {
                    j += jstep;
                    continue;
                }
                let labeled = self
                    .blossom_leaves(bv)
                    .into_iter()
                    .find(|&leaf| self.label[leaf] != 0);
                if let Some(v) = labeled {
                    self.label[v] = 0;
                    let m = self.mate[self.blossombase[bv]];
                    let u = self.endpoint[m];
                    self.label[u] = 0;
                    let end = self.labelend[v];
                    self.assign_label(v, 2, end);
                }
                j += jstep;
            }
        }

        self.label[b] = 0;
        self.labelend[b] = NONE;
        self.blossomchilds[b].clear();
        self.blossomendps[b].clear();
        self.blossombase[b] = NONE;
        self.blossombestedges[b] = None;
        self.bestedge[b] = NONE;
        self.unusedblossoms.push(b);
    }

    /// Swap matched and unmatched edges along the even path inside blossom
    /// `b` from vertex `v` to the base, making `v` the new base.
    fn augment_blossom(&mut self, b: usize, v: usize) {
        let mut t = v;
        while self.blossomparent[t] != b {
            t = self.blossomparent[t];
        }
        if t >= self.nvertex {
            self.augment_blossom(t, v);
        }
        let childs = self.blossomchilds[b].clone();
        let endps = self.blossomendps[b].clone();
        let len = childs.len();
        let i = childs.iter().position(|&c| c == t).unwrap_or(0);
        let mut j = i as isize;
        let (jstep, endptrick): (isize, usize) = if i & 1 != 0 {
            j -= len as isize;
            (1, 0)
        } else {
            (-1, 1)
        };
        while j != 0 {
            j += jstep;
            let t = childs[at(j, len)];
            let p = endps[at(j - endptrick as isize, len)] ^ endptrick;
            if t >= self.nvertex {
                let e = self.endpoint[p];
                self.augment_blossom(t, e);
            }
            j += jstep;
            let t = childs[at(j, len)];
            if t >= self.nvertex {
                let e = self.endpoint[p ^ 1];
                self.augment_blossom(t, e);
            }
            let (x, y) = (self.endpoint[p], self.endpoint[p ^ 1]);
            self.mate[x] = p ^ 1;
            self.mate[y] = p;
        }
        self.blossomchilds[b].rotate_left(i);
        self.blossomendps[b].rotate_left(i);
        self.blossombase[b] = self.blossombase[self.blossomchilds[b][0]];
    }

    /// Augment the matching along the path through edge `k`.
    fn augment_matching(&mut self, k: usize) {
        let (v, w, _) = self.edges[k];
        for (mut s, mut p) in [(v, 2 * k + 1), (w, 2 * k)] {
            loop {
                let bs = self.inblossom[s];
                if bs >= self.nvertex {
                    self.augment_blossom(bs, s);
                }
                self.mate[s] = p;
                if self.labelend[bs] == NONE {
                    break;
                }
                let t = self.endpoint[self.labelend[bs]];
                let bt = self.inblossom[t];
                s = self.endpoint[self.labelend[bt]];
                let j = self.endpoint[self.labelend[bt] ^ 1];
                if bt >= self.nvertex {
                    self.augment_blossom(bt, j);
                }
                self.mate[j] = self.labelend[bt];
                p = self.labelend[bt] ^ 1;
            }
        }
    }

    fn solve(&mut self, max_cardinality: bool) {
        let nv = self.nvertex;
        for _ in 0..nv {
            // Start a stage
            self.label.iter_mut().for_each(|l| *l = 0);
            self.bestedge.iter_mut().for_each(|e| *e = NONE);
            self.blossombestedges[nv..].iter_mut().for_each(|e| *e = None);
            self.allowedge.iter_mut().for_each(|a| *a = false);
            self.queue.clear();
            for v in 0..nv {
                if self.mate[v] == NONE && self.label[self.inblossom[v]] == 0 {
                    self.assign_label(v, 1, NONE);
                }
            }

            let mut augmented = false;
            loop {
                while !augmented {
                    let Some(v) = self.queue.pop() else {
                        break;
                    };
                    augmented = self.scan_vertex(v);
                }
                if augmented {
                    break;
                }

                let (delta_type, delta, delta_edge, delta_blossom) = self.compute_delta(max_cardinality);

                for v in 0..nv {
                    match self.label[self.inblossom[v]] {
                        1 => self.dualvar[v] -= delta,
                        2 => self.dualvar[v] += delta,
                        _ => {}
                    }
                }
                for b in nv..2 * nv {
                    if self.blossombase[b] != NONE && self.blossomparent[b] == NONE {
                        match self.label[b] {
                            1 => self.dualvar[b] += delta,
                            2 => self.dualvar[b] -= delta,
                            _ => {}
                        }
                    }
                }

                match delta_type {
                    2 => {
                        self.allowedge[delta_edge] = true;
                        let (i, j, _) = self.edges[delta_edge];
                        let i = if self.label[self.inblossom[i]] == 0 { j } else { i };
                        self.queue.push(i);
                    }
                    3 => {
                        self.allowedge[delta_edge] = true;
                        let (i, _, _) = self.edges[delta_edge];
                        self.queue.push(i);
                    }
                    4 => self.expand_blossom(delta_blossom, false),
                    _ => break,
                }
            }

            if !augmented {
                break;
            }

            // Expand S-blossoms whose dual reached zero
            for b in nv..2 * nv {
                if self.blossomparent[b] == NONE
                    && self.blossombase[b] != NONE
                    && self.label[b] == 1
                    && self.dualvar[b] == 0
                {
                    self.expand_blossom(b, true);
                }
            }
        }
    }

    /// Scan the edges of S-vertex `v`. Returns whether the matching was
    /// augmented.
    fn scan_vertex(&mut self, v: usize) -> bool {
        let ends = self.neighbend[v].clone();
        for p in ends {
            let k = p / 2;
            let w = self.endpoint[p];
            if self.inblossom[v] == self.inblossom[w] {
                continue;
            }
            let mut kslack = 0;
            if !self.allowedge[k] {
                kslack = self.slack(k);
                if kslack <= 0 {
                    self.allowedge[k] = true;
                }
            }
            let bw = self.inblossom[w];
            if self.allowedge[k] {
                if self.label[bw] == 0 {
                    self.assign_label(w, 2, p ^ 1);
                } else if self.label[bw] == 1 {
                    let base = self.scan_blossom(v, w);
                    if base != NONE {
                        self.add_blossom(base, k);
                    } else {
                        self.augment_matching(k);
                        return true;
                    }
                } else if self.label[w] == 0 {
                    self.label[w] = 2;
                    self.labelend[w] = p ^ 1;
                }
            } else if self.label[bw] == 1 {
                let b = self.inblossom[v];
                if self.bestedge[b] == NONE || kslack < self.slack(self.bestedge[b]) {
                    self.bestedge[b] = k;
                }
            } else if self.label[w] == 0
                && (self.bestedge[w] == NONE || kslack < self.slack(self.bestedge[w]))
            {
                self.bestedge[w] = k;
            }
        }
        false
    }

    /// Pick the dual adjustment: `(type, delta, edge, blossom)`.
    fn compute_delta(&self, max_cardinality: bool) -> (u8, i64, usize, usize) {
        let nv = self.nvertex;
        let mut delta_type = 0u8;
        let mut delta = 0i64;
        let mut delta_edge = NONE;
        let mut delta_blossom = NONE;

        if !max_cardinality {
            delta_type = 1;
            delta = self.dualvar[..nv].iter().copied().min().unwrap_or(0);
        }
        for v in 0..nv {
            if self.label[self.inblossom[v]] == 0 && self.bestedge[v] != NONE {
                let d = self.slack(self.bestedge[v]);
                if delta_type == 0 || d < delta {
                    delta = d;
                    delta_type = 2;
                    delta_edge = self.bestedge[v];
                }
            }
        }
        for b in 0..2 * nv {
            if self.blossomparent[b] == NONE && self.label[b] == 1 && self.bestedge[b] != NONE {
                let d = self.slack(self.bestedge[b]) / 2;
                if delta_type == 0 || d < delta {
                    delta = d;
                    delta_type = 3;
                    delta_edge = self.bestedge[b];
                }
            }
        }
        for b in nv..2 * nv {
            if self.blossombase[b] != NONE
                && self.blossomparent[b] == NONE
                && self.label[b] == 2
                && (delta_type == 0 || self.dualvar[b] < delta)
            {
                delta = self.dualvar[b];
                delta_type = 4;
                delta_blossom = b;
            }
        }
        if delta_type == 0 {
            // Max-cardinality matching found; finish the duals
            delta_type = 1;
            delta = self.dualvar[..nv].iter().copied().min().unwrap_or(0).max(0);
        }
        (delta_type, delta, delta_edge, delta_blossom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_of(mate: &[Option<usize>], edges: &[(usize, usize, i64)]) -> i64 {
        edges
            .iter()
            .filter(|&&(u, v, _)| mate[u] == Some(v))
            .map(|e| e.2)
            .sum()
    }

    fn assert_consistent(mate: &[Option<usize>]) {
        for (v, m) in mate.iter().enumerate() {
            if let Some(w) = m {
                assert_eq!(mate[*w], Some(v));
            }
        }
    }

    #[test]
    fn test_empty_and_single_edge() {
        assert_eq!(max_weight_matching(3, &[], true), vec![None; 3]);
        assert_eq!(max_weight_matching(2, &[(0, 1, 1)], false), vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_prefers_heavier_edge() {
        let mate = max_weight_matching(3, &[(0, 1, 10), (1, 2, 11)], false);
        assert_eq!(mate, vec![None, Some(2), Some(1)]);
    }

    #[test]
    fn test_max_cardinality_over_weight() {
        let edges = [(0, 1, 2), (0, 2, -2), (1, 2, 1), (1, 3, -1), (2, 3, -6)];
        let mate = max_weight_matching(4, &edges, false);
        assert_eq!(mate, vec![Some(1), Some(0), None, None]);
        let mate = max_weight_matching(4, &edges, true);
        assert_eq!(mate, vec![Some(2), Some(3), Some(0), Some(1)]);
    }

    #[test]
    fn test_s_blossom() {
        let edges = [(1, 2, 8), (1, 3, 9), (2, 3, 10), (3, 4, 7)];
        let mate = max_weight_matching(5, &edges, false);
        assert_eq!(mate, vec![None, Some(2), Some(1), Some(4), Some(3)]);
    }

    #[test]
    fn test_blossom_with_augment() {
        let edges = [
            (1, 2, 8),
            (1, 3, 9),
            (2, 3, 10),
            (3, 4, 7),
            (1, 6, 5),
            (4, 5, 6),
        ];
        let mate = max_weight_matching(7, &edges, false);
        assert_eq!(mate, vec![None, Some(6), Some(3), Some(2), Some(5), Some(4), Some(1)]);
    }

    #[test]
    fn test_t_blossom_expansion() {
        let edges = [
            (1, 2, 9),
            (1, 3, 8),
            (2, 3, 10),
            (1, 4, 5),
            (4, 5, 4),
            (1, 6, 3),
        ];
        let mate = max_weight_matching(7, &edges, false);
        assert_eq!(mate, vec![None, Some(6), Some(3), Some(2), Some(5), Some(4), Some(1)]);
    }

    #[test]
    fn test_nested_blossoms() {
        let edges = [
            (1, 2, 9),
            (1, 3, 9),
            (2, 3, 10),
            (2, 4, 8),
            (3, 5, 8),
            (4, 5, 10),
            (5, 6, 6),
        ];
        let mate = max_weight_matching(7, &edges, false);
        assert_eq!(mate, vec![None, Some(3), Some(4), Some(1), Some(2), Some(6), Some(5)]);
    }

    #[test]
    fn test_nested_s_blossom_relabel_expand() {
        let edges = [
            (1, 2, 10),
            (1, 7, 10),
            (2, 3, 12),
            (3, 4, 20),
            (3, 5, 20),
            (4, 5, 25),
            (5, 6, 10),
            (6, 7, 10),
            (7, 8, 8),
        ];
        let mate = max_weight_matching(9, &edges, false);
        assert_eq!(
            mate,
            vec![None, Some(2), Some(1), Some(4), Some(3), Some(6), Some(5), Some(8), Some(7)]
        );
    }

    #[test]
    fn test_nasty_expand() {
        let edges = [
            (1, 2, 45),
            (1, 5, 45),
            (2, 3, 50),
            (3, 4, 45),
            (4, 5, 50),
            (1, 6, 30),
            (3, 9, 35),
            (4, 8, 35),
            (5, 7, 26),
            (9, 10, 5),
        ];
        let mate = max_weight_matching(11, &edges, false);
        assert_eq!(
            mate,
            vec![
                None,
                Some(6),
                Some(3),
                Some(2),
                Some(8),
                Some(7),
                Some(1),
                Some(5),
                Some(4),
                Some(10),
                Some(9)
            ]
        );
    }

    #[test]
    fn test_triangle_strip_is_consistent() {
        // A ladder of unit weights: perfect matching of 6 vertices
        let edges: Vec<(usize, usize, i64)> = vec![
            (0, 1, 1),
            (1, 2, 1),
            (2, 3, 1),
            (3, 4, 1),
            (4, 5, 1),
            (0, 2, 1),
            (2, 4, 1),
        ];
        let mate = max_weight_matching(6, &edges, true);
        assert_consistent(&mate);
        assert!(mate.iter().all(|m| m.is_some()));
        assert_eq!(weight_of(&mate, &edges), 3);
    }
}
