//! Textual "string codes" describing components and their parameters.
//!
//! Grammar:
//!
//! ```text
//! tree   := full [ "{" tree ("," tree)* "}" ]
//! full   := id "(" params ")"
//! params := [ name "=" value ("," name "=" value)* ]
//! ```
//!
//! For example a neuron with two source betas reads
//! `nnu ( actf=lgs ) { ray ( vp_shift=4, b0=0.5, b1=-1 ) }`. A ray without
//! weight ids has `vp_shift=-1`.

use crate::actf::provide_activation;
use crate::error::{NetError, Result};
use crate::feeder::Ray;
use crate::layer::Layer;
use crate::network::FeedForwardNetwork;
use crate::unit::{Unit, UnitKind};

/// A stateful part of a network that can describe and reload itself.
pub trait Component {
    fn id_code(&self) -> &'static str;

    /// Flat `name=value` list, without members.
    fn params(&self) -> String;

    /// # Errors
    ///
    /// Fails on missing or unparsable parameters.
    fn set_params(&mut self, params: &str) -> Result<()>;

    fn members(&self) -> Vec<&dyn Component> {
        Vec::new()
    }

    fn members_mut(&mut self) -> Vec<&mut dyn Component> {
        Vec::new()
    }

    /// Runs after [`set_tree_params`](Self::set_tree_params) has reloaded
    /// every member.
    ///
    /// # Errors
    ///
    /// Fails when the reloaded state is inconsistent.
    fn members_loaded(&mut self) -> Result<()> {
        Ok(())
    }

    /// `id ( params )`
    fn full_code(&self) -> String {
        write_full_code(self.id_code(), &self.params())
    }

    /// Full code of this component followed by its members' tree codes.
    fn tree_full_code(&self) -> String {
        let members: Vec<String> = self.members().iter().map(|m| m.tree_full_code()).collect();
        write_tree_code(&self.full_code(), &members)
    }

    /// Like [`tree_full_code`](Self::tree_full_code) with ids only.
    fn tree_id_code(&self) -> String {
        let members: Vec<String> = self.members().iter().map(|m| m.tree_id_code()).collect();
        write_tree_code(self.id_code(), &members)
    }

    /// Loads parameters from a tree code produced by
    /// [`tree_full_code`](Self::tree_full_code) on a component of the same
    /// shape.
    ///
    /// # Errors
    ///
    /// Fails when ids, member counts or parameters do not match.
    fn set_tree_params(&mut self, code: &str) -> Result<()> {
        let (id, params, members) = read_tree(code)?;
        if id != self.id_code() {
            return Err(NetError::MalformedCode(format!(
                "expected `{}`, found `{id}`",
                self.id_code()
            )));
        }
        self.set_params(params)?;

        let codes = members.map(split_member_codes).unwrap_or_default();
        let mut targets = self.members_mut();
        if codes.len() != targets.len() {
            return Err(NetError::DimensionMismatch {
                expected: targets.len(),
                actual: codes.len(),
            });
        }
        for (m, c) in targets.iter_mut().zip(codes) {
            m.set_tree_params(c)?;
        }
        self.members_loaded()
    }
}

pub fn write_full_code(id: &str, params: &str) -> String {
    if params.is_empty() {
        format!("{id} ( )")
    } else {
        format!("{id} ( {params} )")
    }
}

pub fn write_tree_code(head: &str, members: &[String]) -> String {
    if members.is_empty() {
        head.to_owned()
    } else {
        format!("{head} {{ {} }}", members.join(" , "))
    }
}

/// `name=value`
pub fn compose_param(name: &str, value: impl std::fmt::Display) -> String {
    format!("{name}={value}")
}

pub fn compose_params(params: &[String]) -> String {
    params.join(", ")
}

/// Value of `name` in a flat parameter list.
pub fn read_param_value<'a>(params: &'a str, name: &str) -> Option<&'a str> {
    params.split(',').find_map(|p| {
        let (n, v) = p.split_once('=')?;
        (n.trim() == name).then(|| v.trim())
    })
}

/// Parses `name` as `T`.
///
/// # Errors
///
/// [`NetError::MalformedCode`] if absent, [`NetError::InvalidParam`] if
/// unparsable.
pub fn read_param<T: std::str::FromStr>(params: &str, name: &str) -> Result<T> {
    let raw = read_param_value(params, name)
        .ok_or_else(|| NetError::MalformedCode(format!("missing parameter `{name}`")))?;
    raw.parse().map_err(|_| NetError::InvalidParam {
        name: name.to_owned(),
        value: raw.to_owned(),
    })
}

fn matching_close(s: &str, open_at: usize, open: u8, close: u8) -> Result<usize> {
    let mut depth = 0usize;
    for (i, &c) in s.as_bytes().iter().enumerate().skip(open_at) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
    }
    Err(NetError::MalformedCode(format!("unbalanced `{}` in `{s}`", open as char)))
}

/// Splits a tree code into id, params and the raw member list.
///
/// # Errors
///
/// Fails on unbalanced brackets or a missing parameter block.
pub fn read_tree(code: &str) -> Result<(&str, &str, Option<&str>)> {
    let code = code.trim();
    let open = code
        .find('(')
        .ok_or_else(|| NetError::MalformedCode(format!("no parameter block in `{code}`")))?;
    let close = matching_close(code, open, b'(', b')')?;
    let id = code[..open].trim();
    let params = code[open + 1..close].trim();

    let rest = code[close + 1..].trim();
    if rest.is_empty() {
        return Ok((id, params, None));
    }
    if !rest.starts_with('{') {
        return Err(NetError::MalformedCode(format!("unexpected `{rest}`")));
    }
    let end = matching_close(rest, 0, b'{', b'}')?;
    if !rest[end + 1..].trim().is_empty() {
        return Err(NetError::MalformedCode(format!("trailing text after `{rest}`")));
    }
    Ok((id, params, Some(rest[1..end].trim())))
}

/// Splits a member list on the commas at nesting depth zero.
pub fn split_member_codes(members: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in members.char_indices() {
        match c {
            '(' | '{' => depth += 1,
            ')' | '}' => depth -= 1,
            ',' if depth == 0 => {
                out.push(members[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = members[start..].trim();
    if !last.is_empty() {
        out.push(last);
    }
    out
}

impl Component for Ray {
    fn id_code(&self) -> &'static str {
        "ray"
    }

    fn params(&self) -> String {
        let shift = self.vp_range().and_then(|r| i64::try_from(r.start).ok()).unwrap_or(-1);
        let params: Vec<String> = std::iter::once(compose_param("vp_shift", shift))
            .chain(
                self.betas()
                    .iter()
                    .enumerate()
                    .map(|(i, b)| compose_param(&format!("b{i}"), b)),
            )
            .collect();
        compose_params(&params)
    }

    /// The shift is restored as stored; a network re-derives it from its
    /// layers once all members are loaded.
    fn set_params(&mut self, params: &str) -> Result<()> {
        let shift: i64 = read_param(params, "vp_shift")?;
        self.set_vp_shift(usize::try_from(shift).ok());
        for i in 0..self.n_beta() {
            let b = read_param(params, &format!("b{i}"))?;
            self.set_beta(i, b);
        }
        Ok(())
    }
}

impl Component for Unit {
    fn id_code(&self) -> &'static str {
        match self.kind() {
            UnitKind::Offset => "ofu",
            UnitKind::Input { .. } => "inu",
            UnitKind::Neuron { .. } => "nnu",
        }
    }

    fn params(&self) -> String {
        match self.activation() {
            Some(actf) => compose_param("actf", actf.id_code()),
            None => String::new(),
        }
    }

    fn set_params(&mut self, params: &str) -> Result<()> {
        if self.activation().is_some() {
            let code: String = read_param(params, "actf")?;
            self.set_activation(provide_activation(&code)?);
        }
        Ok(())
    }

    fn members(&self) -> Vec<&dyn Component> {
        self.feeder().map(|f| vec![f as &dyn Component]).unwrap_or_default()
    }

    fn members_mut(&mut self) -> Vec<&mut dyn Component> {
        self.feeder_mut().map(|f| vec![f as &mut dyn Component]).unwrap_or_default()
    }
}

impl Component for Layer {
    fn id_code(&self) -> &'static str {
        "nnl"
    }

    fn params(&self) -> String {
        compose_param("trainable", self.is_trainable())
    }

    fn set_params(&mut self, params: &str) -> Result<()> {
        let trainable: bool = read_param(params, "trainable")?;
        self.set_trainable(trainable);
        Ok(())
    }

    fn members(&self) -> Vec<&dyn Component> {
        self.units().iter().map(|u| u as &dyn Component).collect()
    }

    fn members_mut(&mut self) -> Vec<&mut dyn Component> {
        self.units_mut().iter_mut().map(|u| u as &mut dyn Component).collect()
    }
}

impl Component for FeedForwardNetwork {
    fn id_code(&self) -> &'static str {
        "ffnn"
    }

    fn params(&self) -> String {
        compose_params(&[
            compose_param("n_input", self.n_input()),
            compose_param("n_layer", self.n_layers()),
        ])
    }

    /// Topology is fixed at construction; the params only have to agree.
    fn set_params(&mut self, params: &str) -> Result<()> {
        for (name, have) in [("n_input", self.n_input()), ("n_layer", self.n_layers())] {
            let want: usize = read_param(params, name)?;
            if want != have {
                return Err(NetError::InvalidParam {
                    name: name.to_owned(),
                    value: want.to_string(),
                });
            }
        }
        Ok(())
    }

    fn members(&self) -> Vec<&dyn Component> {
        self.layers().iter().map(|l| l as &dyn Component).collect()
    }

    fn members_mut(&mut self) -> Vec<&mut dyn Component> {
        self.layers_mut().iter_mut().map(|l| l as &mut dyn Component).collect()
    }

    /// Reloaded layers may have changed their trainable state.
    fn members_loaded(&mut self) -> Result<()> {
        if self.is_connected() {
            self.assign_variational_parameters();
        }
        Ok(())
    }
}
