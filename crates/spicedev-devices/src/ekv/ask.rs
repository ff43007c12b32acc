//! Parameter introspection: set and ask by stable integer id.
//!
//! Voltages and currents reported here are physical (PMOS values carry their
//! natural sign). Temperatures are exchanged in degrees Celsius.

use std::sync::OnceLock;

use num_complex::Complex64;
use spicedev_core::constants::{CELSIUS_TO_KELVIN, REFTEMP};
use spicedev_core::{CircuitContext, NodeId, StateHistory};

use super::params::{EkvModelParams, EkvModelValues, MosfetType};
use super::state::EkvState;
use super::{EkvInstance, EkvModel};
use crate::error::{Error, Result};
use crate::param::{Access, Given, ParamInfo, ParamTable, Value, ValueKind};

macro_rules! info {
    ($param:expr, $id:expr, $name:expr, $kind:ident, $access:ident, $desc:expr) => {
        ParamInfo {
            param: $param,
            id: $id,
            name: $name,
            kind: ValueKind::$kind,
            access: Access::$access,
            description: $desc,
        }
    };
}

/// Model-card parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EkvModelParam {
    Nmos,
    Pmos,
    Type,
    Tnom,
    Cox,
    Xj,
    Dw,
    Dl,
    Vto,
    Gamma,
    Phi,
    Kp,
    Theta,
    Ucrit,
    Lambda,
    Weta,
    Leta,
    Q0,
    Lk,
    Tcv,
    Bex,
    Ucex,
    Tr1,
    Tr2,
    Rd,
    Rs,
    Rsh,
    Cbd,
    Cbs,
    Is,
    Js,
    Pb,
    Cj,
    Mj,
    Cjsw,
    Mjsw,
    Fc,
    Cgso,
    Cgdo,
    Cgbo,
    Kf,
    Af,
    Nlev,
}

use EkvModelParam as MP;

static MODEL_PARAMS: [ParamInfo<EkvModelParam>; 43] = [
    info!(MP::Nmos, 101, "nmos", Flag, Input, "N-channel device"),
    info!(MP::Pmos, 102, "pmos", Flag, Input, "P-channel device"),
    info!(MP::Type, 103, "type", Text, Output, "N-channel or P-channel"),
    info!(MP::Tnom, 104, "tnom", Real, InOut, "Parameter measurement temperature"),
    info!(MP::Cox, 105, "cox", Real, InOut, "Gate oxide capacitance per area"),
    info!(MP::Xj, 106, "xj", Real, InOut, "Junction depth"),
    info!(MP::Dw, 107, "dw", Real, InOut, "Channel width correction"),
    info!(MP::Dl, 108, "dl", Real, InOut, "Channel length correction"),
    info!(MP::Vto, 109, "vto", Real, InOut, "Long-channel threshold voltage"),
    info!(MP::Gamma, 110, "gamma", Real, InOut, "Body effect parameter"),
    info!(MP::Phi, 111, "phi", Real, InOut, "Bulk Fermi potential"),
    info!(MP::Kp, 112, "kp", Real, InOut, "Transconductance parameter"),
    info!(MP::Theta, 113, "theta", Real, InOut, "Mobility reduction coefficient"),
    info!(MP::Ucrit, 114, "ucrit", Real, InOut, "Longitudinal critical field"),
    info!(MP::Lambda, 115, "lambda", Real, InOut, "Depletion length coefficient"),
    info!(MP::Weta, 116, "weta", Real, InOut, "Narrow-channel effect coefficient"),
    info!(MP::Leta, 117, "leta", Real, InOut, "Short-channel effect coefficient"),
    info!(MP::Q0, 118, "q0", Real, InOut, "Reverse short-channel charge density"),
    info!(MP::Lk, 119, "lk", Real, InOut, "Reverse short-channel characteristic length"),
    info!(MP::Tcv, 120, "tcv", Real, InOut, "Threshold voltage temperature coefficient"),
    info!(MP::Bex, 121, "bex", Real, InOut, "Mobility temperature exponent"),
    info!(MP::Ucex, 122, "ucex", Real, InOut, "Critical field temperature exponent"),
    info!(MP::Tr1, 123, "tr1", Real, InOut, "Resistance linear temperature coefficient"),
    info!(MP::Tr2, 124, "tr2", Real, InOut, "Resistance quadratic temperature coefficient"),
    info!(MP::Rd, 125, "rd", Real, InOut, "Drain ohmic resistance"),
    info!(MP::Rs, 126, "rs", Real, InOut, "Source ohmic resistance"),
    info!(MP::Rsh, 127, "rsh", Real, InOut, "Sheet resistance"),
    info!(MP::Cbd, 128, "cbd", Real, InOut, "B-D junction capacitance"),
    info!(MP::Cbs, 129, "cbs", Real, InOut, "B-S junction capacitance"),
    info!(MP::Is, 130, "is", Real, InOut, "Bulk junction saturation current"),
    info!(MP::Js, 131, "js", Real, InOut, "Bulk junction saturation current density"),
    info!(MP::Pb, 132, "pb", Real, InOut, "Bulk junction potential"),
    info!(MP::Cj, 133, "cj", Real, InOut, "Bottom junction capacitance per area"),
    info!(MP::Mj, 134, "mj", Real, InOut, "Bottom grading coefficient"),
    info!(MP::Cjsw, 135, "cjsw", Real, InOut, "Side junction capacitance per length"),
    info!(MP::Mjsw, 136, "mjsw", Real, InOut, "Side grading coefficient"),
    info!(MP::Fc, 137, "fc", Real, InOut, "Forward bias junction fit parameter"),
    info!(MP::Cgso, 138, "cgso", Real, InOut, "Gate-source overlap capacitance per width"),
    info!(MP::Cgdo, 139, "cgdo", Real, InOut, "Gate-drain overlap capacitance per width"),
    info!(MP::Cgbo, 140, "cgbo", Real, InOut, "Gate-bulk overlap capacitance per length"),
    info!(MP::Kf, 141, "kf", Real, InOut, "Flicker noise coefficient"),
    info!(MP::Af, 142, "af", Real, InOut, "Flicker noise exponent"),
    info!(MP::Nlev, 143, "nlev", Int, InOut, "Channel noise model selector"),
];

/// Real-valued model parameters: `(variant, field)`.
macro_rules! model_real_fields {
    ($mac:ident) => {
        $mac! {
            Cox cox, Xj xj, Dw dw, Dl dl, Vto vto, Gamma gamma, Phi phi, Kp kp,
            Theta theta, Ucrit ucrit, Lambda lambda, Weta weta, Leta leta, Q0 q0,
            Lk lk, Tcv tcv, Bex bex, Ucex ucex, Tr1 tr1, Tr2 tr2, Rd rd, Rs rs,
            Rsh rsh, Cbd cbd, Cbs cbs, Is is, Js js, Pb pb, Cj cj, Mj mj,
            Cjsw cjsw, Mjsw mjsw, Fc fc, Cgso cgso, Cgdo cgdo, Cgbo cgbo, Kf kf, Af af
        }
    };
}

macro_rules! given_field {
    ($($variant:ident $field:ident),*) => {
        fn model_given(params: &mut EkvModelParams, p: EkvModelParam) -> Option<&mut Given<f64>> {
            match p {
                $(MP::$variant => Some(&mut params.$field),)*
                _ => None,
            }
        }
    };
}

macro_rules! value_field {
    ($($variant:ident $field:ident),*) => {
        fn model_value(values: &EkvModelValues, p: EkvModelParam) -> Option<f64> {
            match p {
                $(MP::$variant => Some(values.$field),)*
                _ => None,
            }
        }
    };
}

model_real_fields!(given_field);
model_real_fields!(value_field);

/// Parameter table of the EKV model card.
pub fn model_params() -> &'static ParamTable<EkvModelParam> {
    static TABLE: OnceLock<ParamTable<EkvModelParam>> = OnceLock::new();
    TABLE.get_or_init(|| ParamTable::new(&MODEL_PARAMS))
}

/// Instance parameters and operating-point quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EkvInstanceParam {
    L,
    W,
    Ad,
    As,
    Pd,
    Ps,
    Nrd,
    Nrs,
    M,
    Temp,
    Off,
    Icvds,
    Icvgs,
    Icvbs,
    DNode,
    GNode,
    SNode,
    BNode,
    DNodePrime,
    SNodePrime,
    Id,
    Ibd,
    Ibs,
    Is,
    Ig,
    Ib,
    Power,
    Gm,
    Gds,
    Gmbs,
    Gbd,
    Gbs,
    Vdsat,
    Von,
    If,
    Ir,
    Cgs,
    Cgd,
    Cgb,
    Capbd,
    Capbs,
    Vgs,
    Vds,
    Vbs,
}

use EkvInstanceParam as IP;

static INSTANCE_PARAMS: [ParamInfo<EkvInstanceParam>; 44] = [
    info!(IP::L, 1, "l", Real, InOut, "Length"),
    info!(IP::W, 2, "w", Real, InOut, "Width"),
    info!(IP::Ad, 3, "ad", Real, InOut, "Drain area"),
    info!(IP::As, 4, "as", Real, InOut, "Source area"),
    info!(IP::Pd, 5, "pd", Real, InOut, "Drain perimeter"),
    info!(IP::Ps, 6, "ps", Real, InOut, "Source perimeter"),
    info!(IP::Nrd, 7, "nrd", Real, InOut, "Drain squares"),
    info!(IP::Nrs, 8, "nrs", Real, InOut, "Source squares"),
    info!(IP::M, 9, "m", Real, InOut, "Parallel multiplier"),
    info!(IP::Temp, 10, "temp", Real, InOut, "Instance temperature"),
    info!(IP::Off, 11, "off", Flag, Input, "Device initially off"),
    info!(IP::Icvds, 12, "icvds", Real, InOut, "Initial D-S voltage"),
    info!(IP::Icvgs, 13, "icvgs", Real, InOut, "Initial G-S voltage"),
    info!(IP::Icvbs, 14, "icvbs", Real, InOut, "Initial B-S voltage"),
    info!(IP::DNode, 201, "dnode", Int, Output, "Number of the drain node"),
    info!(IP::GNode, 202, "gnode", Int, Output, "Number of the gate node"),
    info!(IP::SNode, 203, "snode", Int, Output, "Number of the source node"),
    info!(IP::BNode, 204, "bnode", Int, Output, "Number of the bulk node"),
    info!(IP::DNodePrime, 205, "dnodeprime", Int, Output, "Number of the internal drain node"),
    info!(IP::SNodePrime, 206, "snodeprime", Int, Output, "Number of the internal source node"),
    info!(IP::Id, 207, "id", Real, Output, "Drain current"),
    info!(IP::Ibd, 208, "ibd", Real, Output, "B-D junction current"),
    info!(IP::Ibs, 209, "ibs", Real, Output, "B-S junction current"),
    info!(IP::Is, 210, "is", Real, Output, "Source current"),
    info!(IP::Ig, 211, "ig", Real, Output, "Gate current"),
    info!(IP::Ib, 212, "ib", Real, Output, "Bulk current"),
    info!(IP::Power, 213, "p", Real, Output, "Instantaneous power"),
    info!(IP::Gm, 214, "gm", Real, Output, "Transconductance"),
    info!(IP::Gds, 215, "gds", Real, Output, "Drain-source conductance"),
    info!(IP::Gmbs, 216, "gmbs", Real, Output, "Bulk-source transconductance"),
    info!(IP::Gbd, 217, "gbd", Real, Output, "Bulk-drain conductance"),
    info!(IP::Gbs, 218, "gbs", Real, Output, "Bulk-source conductance"),
    info!(IP::Vdsat, 219, "vdsat", Real, Output, "Saturation drain voltage"),
    info!(IP::Von, 220, "von", Real, Output, "Threshold voltage"),
    info!(IP::If, 221, "if", Real, Output, "Forward normalized current"),
    info!(IP::Ir, 222, "ir", Real, Output, "Reverse normalized current"),
    info!(IP::Cgs, 223, "cgs", Real, Output, "Gate-source capacitance"),
    info!(IP::Cgd, 224, "cgd", Real, Output, "Gate-drain capacitance"),
    info!(IP::Cgb, 225, "cgb", Real, Output, "Gate-bulk capacitance"),
    info!(IP::Capbd, 226, "cbd", Real, Output, "Bulk-drain capacitance"),
    info!(IP::Capbs, 227, "cbs", Real, Output, "Bulk-source capacitance"),
    info!(IP::Vgs, 228, "vgs", Real, Output, "Gate-source voltage"),
    info!(IP::Vds, 229, "vds", Real, Output, "Drain-source voltage"),
    info!(IP::Vbs, 230, "vbs", Real, Output, "Bulk-source voltage"),
];

/// Parameter table of an EKV instance.
pub fn instance_params() -> &'static ParamTable<EkvInstanceParam> {
    static TABLE: OnceLock<ParamTable<EkvInstanceParam>> = OnceLock::new();
    TABLE.get_or_init(|| ParamTable::new(&INSTANCE_PARAMS))
}

impl EkvModel {
    fn bad_param(&self, id: u32) -> Error {
        Error::BadParameter {
            device: self.name.clone(),
            id,
        }
    }

    /// Set a model parameter. Takes effect at the next temperature update.
    pub fn set(&mut self, id: u32, value: &Value) -> Result<()> {
        let info = model_params()
            .by_id(id)
            .filter(|i| i.access.settable())
            .ok_or_else(|| self.bad_param(id))?;
        match info.param {
            MP::Nmos | MP::Pmos => {
                let flag = value.as_flag().ok_or_else(|| self.bad_param(id))?;
                if flag {
                    self.params.mos_type = if info.param == MP::Nmos {
                        MosfetType::Nmos
                    } else {
                        MosfetType::Pmos
                    };
                }
            }
            MP::Tnom => {
                let v = value.as_real().ok_or_else(|| self.bad_param(id))?;
                self.params.tnom.set(v + CELSIUS_TO_KELVIN);
            }
            MP::Nlev => {
                let v = value.as_int().ok_or_else(|| self.bad_param(id))?;
                self.params.nlev.set(v);
            }
            p => {
                let v = value.as_real().ok_or_else(|| self.bad_param(id))?;
                match model_given(&mut self.params, p) {
                    Some(field) => field.set(v),
                    None => return Err(self.bad_param(id)),
                }
            }
        }
        Ok(())
    }

    /// Set a model parameter by name.
    pub fn set_by_name(&mut self, name: &str, value: &Value) -> Result<()> {
        let id = model_params()
            .by_name(name)
            .map(|i| i.id)
            .ok_or_else(|| Error::UnknownParameter {
                device: self.name.clone(),
                name: name.to_string(),
            })?;
        self.set(id, value)
    }

    /// Ask a model parameter; defaults are reported for parameters never given.
    pub fn ask(&self, id: u32) -> Result<Value> {
        let info = model_params()
            .by_id(id)
            .filter(|i| i.access.askable())
            .ok_or_else(|| self.bad_param(id))?;
        let values = match &self.values {
            Some(v) => v.clone(),
            None => self.params.resolve(REFTEMP),
        };
        let value = match info.param {
            MP::Type => Value::Text(values.mos_type.name()),
            MP::Tnom => Value::Real(values.tnom - CELSIUS_TO_KELVIN),
            MP::Nlev => Value::Int(values.nlev),
            p => Value::Real(model_value(&values, p).ok_or_else(|| self.bad_param(id))?),
        };
        Ok(value)
    }
}

impl EkvInstance {
    fn bad_param(&self, id: u32) -> Error {
        Error::BadParameter {
            device: self.name.clone(),
            id,
        }
    }

    /// Set an instance parameter. Takes effect at the next temperature update.
    pub fn set(&mut self, id: u32, value: &Value) -> Result<()> {
        let info = instance_params()
            .by_id(id)
            .filter(|i| i.access.settable())
            .ok_or_else(|| self.bad_param(id))?;
        if info.param == IP::Off {
            self.params.off = value.as_flag().ok_or_else(|| self.bad_param(id))?;
            return Ok(());
        }
        let v = value.as_real().ok_or_else(|| self.bad_param(id))?;
        let p = &mut self.params;
        match info.param {
            IP::L => p.l.set(v),
            IP::W => p.w.set(v),
            IP::Ad => p.ad.set(v),
            IP::As => p.as_.set(v),
            IP::Pd => p.pd.set(v),
            IP::Ps => p.ps.set(v),
            IP::Nrd => p.nrd.set(v),
            IP::Nrs => p.nrs.set(v),
            IP::M => p.m.set(v),
            IP::Temp => p.temp.set(v + CELSIUS_TO_KELVIN),
            IP::Icvds => p.icvds.set(v),
            IP::Icvgs => p.icvgs.set(v),
            IP::Icvbs => p.icvbs.set(v),
            _ => return Err(self.bad_param(id)),
        }
        Ok(())
    }

    /// Set an instance parameter by name.
    pub fn set_by_name(&mut self, name: &str, value: &Value) -> Result<()> {
        let id = instance_params()
            .by_name(name)
            .map(|i| i.id)
            .ok_or_else(|| Error::UnknownParameter {
                device: self.name.clone(),
                name: name.to_string(),
            })?;
        self.set(id, value)
    }

    /// Ask an instance parameter or operating-point quantity.
    ///
    /// Current and power queries return `Value::Complex(0)` during AC and
    /// noise analyses, where no large-signal quantity is meaningful.
    pub fn ask(
        &self,
        model: &EkvModel,
        id: u32,
        ctx: &CircuitContext,
        states: &StateHistory,
    ) -> Result<Value> {
        let info = instance_params()
            .by_id(id)
            .filter(|i| i.access.askable())
            .ok_or_else(|| self.bad_param(id))?;

        let node = |n: NodeId| -> Result<Value> { Ok(Value::Int(i64::from(n.as_u32()))) };
        let values = match &self.values {
            Some(v) => v.clone(),
            None => self.params.resolve(ctx.temp),
        };
        match info.param {
            IP::L => return Ok(Value::Real(values.l)),
            IP::W => return Ok(Value::Real(values.w)),
            IP::Ad => return Ok(Value::Real(values.ad)),
            IP::As => return Ok(Value::Real(values.as_)),
            IP::Pd => return Ok(Value::Real(values.pd)),
            IP::Ps => return Ok(Value::Real(values.ps)),
            IP::Nrd => return Ok(Value::Real(values.nrd)),
            IP::Nrs => return Ok(Value::Real(values.nrs)),
            IP::M => return Ok(Value::Real(values.m)),
            IP::Temp => return Ok(Value::Real(values.temp - CELSIUS_TO_KELVIN)),
            IP::Icvds => return Ok(Value::Real(values.icvds)),
            IP::Icvgs => return Ok(Value::Real(values.icvgs)),
            IP::Icvbs => return Ok(Value::Real(values.icvbs)),
            IP::DNode => return node(self.nodes.drain),
            IP::GNode => return node(self.nodes.gate),
            IP::SNode => return node(self.nodes.source),
            IP::BNode => return node(self.nodes.bulk),
            IP::DNodePrime => return node(self.nodes.drain_prime),
            IP::SNodePrime => return node(self.nodes.source_prime),
            _ => {}
        }

        let is_current = matches!(
            info.param,
            IP::Id | IP::Ibd | IP::Ibs | IP::Is | IP::Ig | IP::Ib | IP::Power
        );
        if is_current && ctx.doing_ac() {
            return Ok(Value::Complex(Complex64::new(0.0, 0.0)));
        }

        let op = self.op.as_ref().ok_or_else(|| Error::NotLoaded {
            device: self.name.clone(),
        })?;
        let base = self.state_slot_base()?;
        let s0 = EkvState::read(states, 0, base)?;
        let sign = model.params.mos_type.sign();
        let (_, derived) = self.prepared()?;

        // Terminal currents into the device, in the device's own polarity
        let (cqgs, cqgd, cqgb) = if ctx.is_transient() {
            (s0.cqgs, s0.cqgd, s0.cqgb)
        } else {
            (0.0, 0.0, 0.0)
        };
        let ig = cqgs + cqgd + cqgb;
        let ib = op.cbd + op.cbs - cqgb;
        let id_ = op.cd - cqgd;
        let is_ = -(id_ + ig + ib);

        let v = match info.param {
            IP::Id => sign * id_,
            IP::Ibd => sign * op.cbd,
            IP::Ibs => sign * op.cbs,
            IP::Is => sign * is_,
            IP::Ig => sign * ig,
            IP::Ib => sign * ib,
            IP::Power => {
                let vd = ctx.voltage(self.nodes.drain);
                let vg = ctx.voltage(self.nodes.gate);
                let vs = ctx.voltage(self.nodes.source);
                let vb = ctx.voltage(self.nodes.bulk);
                sign * (id_ * vd + ig * vg + is_ * vs + ib * vb)
            }
            IP::Gm => op.gm(),
            IP::Gds => op.gds(),
            IP::Gmbs => op.gmbs(),
            IP::Gbd => op.gbd,
            IP::Gbs => op.gbs,
            IP::Vdsat => sign * op.dc.eval.vdsat,
            IP::Von => sign * op.dc.eval.von,
            IP::If => op.dc.eval.if_,
            IP::Ir => op.dc.eval.ir,
            IP::Cgs => 2.0 * s0.capgs + derived.cgs_overlap,
            IP::Cgd => 2.0 * s0.capgd + derived.cgd_overlap,
            IP::Cgb => 2.0 * s0.capgb + derived.cgb_overlap,
            IP::Capbd => op.capbd,
            IP::Capbs => op.capbs,
            IP::Vgs => sign * op.bias.vgs,
            IP::Vds => sign * op.bias.vds,
            IP::Vbs => sign * op.bias.vbs,
            _ => return Err(self.bad_param(id)),
        };
        Ok(Value::Real(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ekv::EkvInstanceParams;

    fn instance() -> EkvInstance {
        EkvInstance::new(
            "M1",
            NodeId::new(1),
            NodeId::new(2),
            NodeId::GROUND,
            NodeId::GROUND,
            EkvInstanceParams::default(),
        )
    }

    #[test]
    fn test_tables_have_unique_ids_and_names() {
        for table_len in [model_params().len(), instance_params().len()] {
            assert!(table_len > 0);
        }
        let mut ids: Vec<_> = model_params()
            .iter()
            .map(|i| i.id)
            .chain(instance_params().iter().map(|i| i.id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), model_params().len() + instance_params().len());

        let mut names: Vec<_> = instance_params().iter().map(|i| i.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), instance_params().len());
    }

    #[test]
    fn test_model_set_and_ask() {
        let mut model = EkvModel::new("nch", EkvModelParams::nmos());
        assert_eq!(model.ask(109).unwrap(), Value::Real(0.5));
        model.set_by_name("VTO", &Value::Real(0.7)).unwrap();
        assert_eq!(model.ask(109).unwrap(), Value::Real(0.7));
        model.set(102, &Value::Flag(true)).unwrap();
        assert_eq!(model.ask(103).unwrap(), Value::Text("pmos"));
        model.set(104, &Value::Real(50.0)).unwrap();
        match model.ask(104).unwrap() {
            Value::Real(t) => assert!((t - 50.0).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_model_bad_ids() {
        let mut model = EkvModel::new("nch", EkvModelParams::nmos());
        assert!(matches!(model.ask(9999), Err(Error::BadParameter { id: 9999, .. })));
        // "type" is read-only and "nmos" write-only
        assert!(model.set(103, &Value::Text("nmos")).is_err());
        assert!(model.ask(101).is_err());
        // wrong kind
        assert!(model.set(109, &Value::Flag(true)).is_err());
        assert!(matches!(
            model.set_by_name("bogus", &Value::Real(1.0)),
            Err(Error::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_instance_temperature_in_celsius() {
        let mut inst = instance();
        inst.set_by_name("temp", &Value::Real(27.0)).unwrap();
        let kelvin = inst.params.temp.get().unwrap();
        assert!((kelvin - 300.15).abs() < 1e-9);
        inst.set(11, &Value::Flag(true)).unwrap();
        assert!(inst.params.off);
    }

    #[test]
    fn test_instance_ask_geometry_and_nodes() {
        let model = EkvModel::new("nch", EkvModelParams::nmos());
        let inst = instance();
        let ctx = CircuitContext::new(2);
        let states = StateHistory::new(EkvState::NUM_SLOTS, 3);
        assert_eq!(inst.ask(&model, 2, &ctx, &states).unwrap(), Value::Real(1e-6));
        assert_eq!(inst.ask(&model, 202, &ctx, &states).unwrap(), Value::Int(2));
        assert!(matches!(
            inst.ask(&model, 214, &ctx, &states),
            Err(Error::NotLoaded { .. })
        ));
        assert!(inst.ask(&model, 11, &ctx, &states).is_err());
    }

    #[test]
    fn test_currents_during_ac_are_complex_zero() {
        let model = EkvModel::new("nch", EkvModelParams::nmos());
        let inst = instance();
        let mut ctx = CircuitContext::new(2);
        ctx.mode = spicedev_core::AnalysisMode::Ac;
        let states = StateHistory::new(EkvState::NUM_SLOTS, 3);
        for id in [207, 210, 213] {
            assert_eq!(
                inst.ask(&model, id, &ctx, &states).unwrap(),
                Value::Complex(Complex64::new(0.0, 0.0))
            );
        }
    }
}
