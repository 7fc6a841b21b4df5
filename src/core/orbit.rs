use std::f64::consts::{PI, TAU};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::deep_space::{DeepSpace, MeanElements};
use super::elements::{ElementRecord, OrbitClass};
use super::frames::gstime;

// WGS-72 gravity model, the one SGP4 element sets are fitted against.
pub const MU: f64 = 398_600.8;
pub const EARTH_RADIUS_KM: f64 = 6378.135;
pub(crate) const J2: f64 = 0.001_082_616;
pub(crate) const J3: f64 = -0.000_002_538_81;
pub(crate) const J4: f64 = -0.000_001_655_97;
pub(crate) const J3_OVER_J2: f64 = J3 / J2;
pub(crate) const X2O3: f64 = 2.0 / 3.0;

/// sqrt(GM) in earth radii^1.5 per minute.
pub(crate) fn xke() -> f64 {
    60.0 / (EARTH_RADIUS_KM * EARTH_RADIUS_KM * EARTH_RADIUS_KM / MU).sqrt()
}

/// Julian date of the SGP4 time origin, 1949-12-31 00:00 UTC.
const JD_1950: f64 = 2_433_281.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeplerSettings {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for KeplerSettings {
    fn default() -> Self {
        Self { tolerance: 1e-12, max_iterations: 10 }
    }
}

/// Position (km) and velocity (km/s) in the TEME inertial frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrbitState {
    pub time: DateTime<Utc>,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

impl OrbitState {
    pub fn radius(&self) -> f64 {
        norm(&self.position)
    }

    pub fn speed(&self) -> f64 {
        norm(&self.velocity)
    }
}

fn norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    #[error("invalid elements: {reason}")]
    InvalidElements { reason: &'static str },
    #[error("object has decayed (radius {radius_km:.1} km)")]
    Decayed { radius_km: f64 },
    #[error("kepler solve did not converge after {iterations} iterations (residual {residual:e})")]
    NonConvergent { iterations: u32, residual: f64 },
}

/// Recovers the Brouwer (un-Kozai'd) mean motion in rad/min.
pub(crate) fn brouwer_mean_motion(kozai: f64, ecc: f64, incl: f64) -> f64 {
    let omeosq = 1.0 - ecc * ecc;
    let rteosq = omeosq.sqrt();
    let cosio = incl.cos();
    let ak = (xke() / kozai).powf(X2O3);
    let d1 = 0.75 * J2 * (3.0 * cosio * cosio - 1.0) / (rteosq * omeosq);
    let mut del = d1 / (ak * ak);
    let adel = ak * (1.0 - del * del - del * (1.0 / 3.0 + 134.0 * del * del / 81.0));
    del = d1 / (adel * adel);
    kozai / (1.0 + del)
}

/// Secular drag terms kept only when perigee is above 220 km.
#[derive(Debug, Clone)]
struct DragTerms {
    cc5: f64,
    omgcof: f64,
    xmcof: f64,
    delmo: f64,
    sinmao: f64,
    eta: f64,
    d2: f64,
    d3: f64,
    d4: f64,
    t3cof: f64,
    t4cof: f64,
    t5cof: f64,
}

#[derive(Debug, Clone)]
enum Branch {
    NearEarth { drag: Option<DragTerms> },
    DeepSpace(Box<DeepSpace>),
}

/// Initialised SGP4/SDP4 model for one element set.
#[derive(Debug, Clone)]
pub struct Propagator {
    norad_id: u32,
    epoch: DateTime<Utc>,
    bstar: f64,
    inclo: f64,
    nodeo: f64,
    ecco: f64,
    argpo: f64,
    mo: f64,
    no: f64,
    con41: f64,
    x1mth2: f64,
    x7thm1: f64,
    cc1: f64,
    cc4: f64,
    mdot: f64,
    argpdot: f64,
    nodedot: f64,
    nodecf: f64,
    t2cof: f64,
    xlcof: f64,
    aycof: f64,
    branch: Branch,
}

impl Propagator {
    pub fn new(record: &ElementRecord) -> Result<Self, PropagationError> {
        if !(record.mean_motion > 0.0) || !record.mean_motion.is_finite() {
            return Err(PropagationError::InvalidElements {
                reason: "mean motion must be positive",
            });
        }
        if !(0.0..1.0).contains(&record.eccentricity) {
            return Err(PropagationError::InvalidElements { reason: "eccentricity outside [0, 1)" });
        }

        let xke = xke();
        let ecco = record.eccentricity;
        let inclo = record.inclination.to_radians();
        let nodeo = record.right_ascension.to_radians();
        let argpo = record.argument_of_perigee.to_radians();
        let mo = record.mean_anomaly.to_radians();
        let bstar = record.drag_term;

        let eccsq = ecco * ecco;
        let omeosq = 1.0 - eccsq;
        let rteosq = omeosq.sqrt();
        let cosio = inclo.cos();
        let cosio2 = cosio * cosio;
        let sinio = inclo.sin();

        let no = brouwer_mean_motion(record.kozai_mean_motion(), ecco, inclo);
        if !(no > 0.0) {
            return Err(PropagationError::InvalidElements {
                reason: "mean motion must be positive",
            });
        }
        let ao = (xke / no).powf(X2O3);
        let po = ao * omeosq;
        let con42 = 1.0 - 5.0 * cosio2;
        let con41 = -con42 - cosio2 - cosio2;
        let posq = po * po;
        let rp = ao * (1.0 - ecco);
        if rp < 1.0 {
            return Err(PropagationError::Decayed { radius_km: rp * EARTH_RADIUS_KM });
        }

        // Atmospheric density parameters, adjusted for low perigees.
        let ss = 78.0 / EARTH_RADIUS_KM + 1.0;
        let qzms2t = ((120.0 - 78.0) / EARTH_RADIUS_KM).powi(4);
        let perigee_km = (rp - 1.0) * EARTH_RADIUS_KM;
        let (sfour, qzms24) = if perigee_km < 156.0 {
            let s = if perigee_km < 98.0 { 20.0 } else { perigee_km - 78.0 };
            (s / EARTH_RADIUS_KM + 1.0, ((120.0 - s) / EARTH_RADIUS_KM).powi(4))
        } else {
            (ss, qzms2t)
        };

        let pinvsq = 1.0 / posq;
        let tsi = 1.0 / (ao - sfour);
        let eta = ao * ecco * tsi;
        let etasq = eta * eta;
        let eeta = ecco * eta;
        let psisq = (1.0 - etasq).abs();
        let coef = qzms24 * tsi.powi(4);
        let coef1 = coef / psisq.powf(3.5);
        let cc2 = coef1
            * no
            * (ao * (1.0 + 1.5 * etasq + eeta * (4.0 + etasq))
                + 0.375 * J2 * tsi / psisq * con41 * (8.0 + 3.0 * etasq * (8.0 + etasq)));
        let cc1 = bstar * cc2;
        let cc3 =
            if ecco > 1.0e-4 { -2.0 * coef * tsi * J3_OVER_J2 * no * sinio / ecco } else { 0.0 };
        let x1mth2 = 1.0 - cosio2;
        let cc4 = 2.0
            * no
            * coef1
            * ao
            * omeosq
            * (eta * (2.0 + 0.5 * etasq) + ecco * (0.5 + 2.0 * etasq)
                - J2 * tsi / (ao * psisq)
                    * (-3.0 * con41 * (1.0 - 2.0 * eeta + etasq * (1.5 - 0.5 * eeta))
                        + 0.75
                            * x1mth2
                            * (2.0 * etasq - eeta * (1.0 + etasq))
                            * (2.0 * argpo).cos()));
        let cc5 = 2.0 * coef1 * ao * omeosq * (1.0 + 2.75 * (etasq + eeta) + eeta * etasq);

        let cosio4 = cosio2 * cosio2;
        let temp1 = 1.5 * J2 * pinvsq * no;
        let temp2 = 0.5 * temp1 * J2 * pinvsq;
        let temp3 = -0.46875 * J4 * pinvsq * pinvsq * no;
        let mdot = no
            + 0.5 * temp1 * rteosq * con41
            + 0.0625 * temp2 * rteosq * (13.0 - 78.0 * cosio2 + 137.0 * cosio4);
        let argpdot = -0.5 * temp1 * con42
            + 0.0625 * temp2 * (7.0 - 114.0 * cosio2 + 395.0 * cosio4)
            + temp3 * (3.0 - 36.0 * cosio2 + 49.0 * cosio4);
        let xhdot1 = -temp1 * cosio;
        let nodedot = xhdot1
            + (0.5 * temp2 * (4.0 - 19.0 * cosio2) + 2.0 * temp3 * (3.0 - 7.0 * cosio2)) * cosio;
        let xpidot = argpdot + nodedot;
        let nodecf = 3.5 * omeosq * xhdot1 * cc1;
        let t2cof = 1.5 * cc1;
        let xlcof = long_period_xlcof(sinio, cosio);
        let aycof = -0.5 * J3_OVER_J2 * sinio;

        let branch = match record.orbit_class {
            OrbitClass::DeepSpace => {
                let epoch_days = days_since_1950(record.epoch);
                let gsto = gstime(epoch_days + JD_1950);
                Branch::DeepSpace(Box::new(DeepSpace::new(
                    epoch_days,
                    gsto,
                    MeanElements {
                        ecc: ecco,
                        argp: argpo,
                        incl: inclo,
                        mean_anomaly: mo,
                        node: nodeo,
                        mean_motion: no,
                    },
                    mdot,
                    argpdot,
                    nodedot,
                    xpidot,
                )))
            }
            OrbitClass::NearEarth if rp < 220.0 / EARTH_RADIUS_KM + 1.0 => {
                Branch::NearEarth { drag: None }
            }
            OrbitClass::NearEarth => {
                let cc1sq = cc1 * cc1;
                let d2 = 4.0 * ao * tsi * cc1sq;
                let temp = d2 * tsi * cc1 / 3.0;
                let d3 = (17.0 * ao + sfour) * temp;
                let d4 = 0.5 * temp * ao * tsi * (221.0 * ao + 31.0 * sfour) * cc1;
                Branch::NearEarth {
                    drag: Some(DragTerms {
                        cc5,
                        omgcof: bstar * cc3 * argpo.cos(),
                        xmcof: if ecco > 1.0e-4 { -X2O3 * coef * bstar / eeta } else { 0.0 },
                        delmo: (1.0 + eta * mo.cos()).powi(3),
                        sinmao: mo.sin(),
                        eta,
                        d2,
                        d3,
                        d4,
                        t3cof: d2 + 2.0 * cc1sq,
                        t4cof: 0.25 * (3.0 * d3 + cc1 * (12.0 * d2 + 10.0 * cc1sq)),
                        t5cof: 0.2
                            * (3.0 * d4
                                + 12.0 * cc1 * d3
                                + 6.0 * d2 * d2
                                + 15.0 * cc1sq * (2.0 * d2 + cc1sq)),
                    }),
                }
            }
        };

        debug!(
            norad = record.norad_id,
            deep_space = record.orbit_class.is_deep_space(),
            "Initialised propagator"
        );

        Ok(Self {
            norad_id: record.norad_id,
            epoch: record.epoch,
            bstar,
            inclo,
            nodeo,
            ecco,
            argpo,
            mo,
            no,
            con41,
            x1mth2,
            x7thm1: 7.0 * cosio2 - 1.0,
            cc1,
            cc4,
            mdot,
            argpdot,
            nodedot,
            nodecf,
            t2cof,
            xlcof,
            aycof,
            branch,
        })
    }

    pub fn norad_id(&self) -> u32 {
        self.norad_id
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn is_deep_space(&self) -> bool {
        matches!(self.branch, Branch::DeepSpace(_))
    }

    /// Propagates to an absolute time.
    pub fn propagate_at(
        &self,
        time: DateTime<Utc>,
        settings: &KeplerSettings,
    ) -> Result<OrbitState, PropagationError> {
        let delta = time - self.epoch;
        let minutes = match delta.num_nanoseconds() {
            Some(ns) => ns as f64 / 60e9,
            None => delta.num_milliseconds() as f64 / 60e3,
        };
        let (position, velocity) = self.teme(minutes, settings)?;
        Ok(OrbitState { time, position, velocity })
    }

    /// Propagates `minutes` from epoch (negative values go backwards).
    pub fn propagate_minutes(
        &self,
        minutes: f64,
        settings: &KeplerSettings,
    ) -> Result<OrbitState, PropagationError> {
        let (position, velocity) = self.teme(minutes, settings)?;
        let time = self.epoch + Duration::nanoseconds((minutes * 60e9).round() as i64);
        Ok(OrbitState { time, position, velocity })
    }

    fn teme(
        &self,
        t: f64,
        settings: &KeplerSettings,
    ) -> Result<([f64; 3], [f64; 3]), PropagationError> {
        let xke = xke();

        // Secular gravity and drag.
        let xmdf = self.mo + self.mdot * t;
        let argpdf = self.argpo + self.argpdot * t;
        let nodedf = self.nodeo + self.nodedot * t;
        let t2 = t * t;
        let mut mean = MeanElements {
            ecc: self.ecco,
            argp: argpdf,
            incl: self.inclo,
            mean_anomaly: xmdf,
            node: nodedf + self.nodecf * t2,
            mean_motion: self.no,
        };
        let mut tempa = 1.0 - self.cc1 * t;
        let mut tempe = self.bstar * self.cc4 * t;
        let mut templ = self.t2cof * t2;

        match &self.branch {
            Branch::NearEarth { drag: Some(drag) } => {
                let delomg = drag.omgcof * t;
                let delm = drag.xmcof * ((1.0 + drag.eta * xmdf.cos()).powi(3) - drag.delmo);
                let temp = delomg + delm;
                mean.mean_anomaly = xmdf + temp;
                mean.argp = argpdf - temp;
                let t3 = t2 * t;
                let t4 = t3 * t;
                tempa -= drag.d2 * t2 + drag.d3 * t3 + drag.d4 * t4;
                tempe += self.bstar * drag.cc5 * (mean.mean_anomaly.sin() - drag.sinmao);
                templ += drag.t3cof * t3 + t4 * (drag.t4cof + t * drag.t5cof);
            }
            Branch::NearEarth { drag: None } => {}
            Branch::DeepSpace(deep) => {
                mean = deep.secular(t, mean);
            }
        }

        if !(mean.mean_motion > 0.0) {
            return Err(PropagationError::InvalidElements {
                reason: "mean motion became non-positive",
            });
        }
        // Drag has consumed the whole semi-major axis once tempa reaches zero.
        if tempa <= 0.0 {
            return Err(PropagationError::Decayed { radius_km: 0.0 });
        }
        let am = (xke / mean.mean_motion).powf(X2O3) * tempa * tempa;
        if am < 0.95 {
            return Err(PropagationError::Decayed { radius_km: am * EARTH_RADIUS_KM });
        }
        let nm = xke / am.powf(1.5);
        let mut em = mean.ecc - tempe;
        if !(-0.001..1.0).contains(&em) {
            return Err(PropagationError::InvalidElements {
                reason: "eccentricity left [0, 1) after secular update",
            });
        }
        if em < 1.0e-6 {
            em = 1.0e-6;
        }
        let mm = mean.mean_anomaly + self.no * templ;
        let xlm = mm + mean.argp + mean.node;
        let nodem = mean.node % TAU;
        let argpm = mean.argp % TAU;
        let xlm = xlm % TAU;
        let mm = (xlm - argpm - nodem) % TAU;

        // Lunar-solar periodics.
        let mut osc = MeanElements {
            ecc: em,
            argp: argpm,
            incl: mean.incl,
            mean_anomaly: mm,
            node: nodem,
            mean_motion: nm,
        };
        let mut sinip = mean.incl.sin();
        let mut cosip = mean.incl.cos();
        let mut aycof = self.aycof;
        let mut xlcof = self.xlcof;
        let (mut con41, mut x1mth2, mut x7thm1) = (self.con41, self.x1mth2, self.x7thm1);
        if let Branch::DeepSpace(deep) = &self.branch {
            osc = deep.periodics(t, osc);
            if osc.incl < 0.0 {
                osc.incl = -osc.incl;
                osc.node += PI;
                osc.argp -= PI;
            }
            if !(0.0..=1.0).contains(&osc.ecc) {
                return Err(PropagationError::InvalidElements {
                    reason: "perturbed eccentricity outside [0, 1]",
                });
            }
            sinip = osc.incl.sin();
            cosip = osc.incl.cos();
            aycof = -0.5 * J3_OVER_J2 * sinip;
            xlcof = long_period_xlcof(sinip, cosip);
            let cosisq = cosip * cosip;
            con41 = 3.0 * cosisq - 1.0;
            x1mth2 = 1.0 - cosisq;
            x7thm1 = 7.0 * cosisq - 1.0;
        }

        // Long-period J3 terms.
        let ep = osc.ecc;
        let axnl = ep * osc.argp.cos();
        let temp = 1.0 / (am * (1.0 - ep * ep));
        let aynl = ep * osc.argp.sin() + temp * aycof;
        let xl = osc.mean_anomaly + osc.argp + osc.node + temp * xlcof * axnl;

        let (sineo1, coseo1) = solve_kepler((xl - osc.node) % TAU, axnl, aynl, settings)?;

        // Short-period terms.
        let ecose = axnl * coseo1 + aynl * sineo1;
        let esine = axnl * sineo1 - aynl * coseo1;
        let el2 = axnl * axnl + aynl * aynl;
        let pl = am * (1.0 - el2);
        if pl < 0.0 {
            return Err(PropagationError::InvalidElements {
                reason: "semi-latus rectum is negative",
            });
        }
        let rl = am * (1.0 - ecose);
        let rdotl = am.sqrt() * esine / rl;
        let rvdotl = pl.sqrt() / rl;
        let betal = (1.0 - el2).sqrt();
        let temp = esine / (1.0 + betal);
        let sinu = am / rl * (sineo1 - aynl - axnl * temp);
        let cosu = am / rl * (coseo1 - axnl + aynl * temp);
        let su = sinu.atan2(cosu);
        let sin2u = (cosu + cosu) * sinu;
        let cos2u = 1.0 - 2.0 * sinu * sinu;
        let temp = 1.0 / pl;
        let temp1 = 0.5 * J2 * temp;
        let temp2 = temp1 * temp;

        let mrt = rl * (1.0 - 1.5 * temp2 * betal * con41) + 0.5 * temp1 * x1mth2 * cos2u;
        let su = su - 0.25 * temp2 * x7thm1 * sin2u;
        let xnode = osc.node + 1.5 * temp2 * cosip * sin2u;
        let xinc = osc.incl + 1.5 * temp2 * cosip * sinip * cos2u;
        let mvt = rdotl - nm * temp1 * x1mth2 * sin2u / xke;
        let rvdot = rvdotl + nm * temp1 * (x1mth2 * cos2u + 1.5 * con41) / xke;

        if mrt < 1.0 {
            return Err(PropagationError::Decayed { radius_km: mrt * EARTH_RADIUS_KM });
        }

        let (sinsu, cossu) = su.sin_cos();
        let (snod, cnod) = xnode.sin_cos();
        let (sini, cosi) = xinc.sin_cos();
        let xmx = -snod * cosi;
        let xmy = cnod * cosi;
        let ux = xmx * sinsu + cnod * cossu;
        let uy = xmy * sinsu + snod * cossu;
        let uz = sini * sinsu;
        let vx = xmx * cossu - cnod * sinsu;
        let vy = xmy * cossu - snod * sinsu;
        let vz = sini * cossu;

        let vkmpersec = EARTH_RADIUS_KM * xke / 60.0;
        let position =
            [mrt * ux * EARTH_RADIUS_KM, mrt * uy * EARTH_RADIUS_KM, mrt * uz * EARTH_RADIUS_KM];
        let velocity = [
            (mvt * ux + rvdot * vx) * vkmpersec,
            (mvt * uy + rvdot * vy) * vkmpersec,
            (mvt * uz + rvdot * vz) * vkmpersec,
        ];
        if position.iter().chain(velocity.iter()).any(|v| !v.is_finite()) {
            return Err(PropagationError::InvalidElements { reason: "state is not finite" });
        }
        Ok((position, velocity))
    }
}

/// Builds a propagator and evaluates it once.
pub fn propagate(
    record: &ElementRecord,
    time: DateTime<Utc>,
    settings: &KeplerSettings,
) -> Result<OrbitState, PropagationError> {
    Propagator::new(record)?.propagate_at(time, settings)
}

fn long_period_xlcof(sinio: f64, cosio: f64) -> f64 {
    let denom = if (cosio + 1.0).abs() > 1.5e-12 { 1.0 + cosio } else { 1.5e-12 };
    -0.25 * J3_OVER_J2 * sinio * (3.0 + 5.0 * cosio) / denom
}

/// Newton iteration for the eccentric longitude. Returns the sine and cosine
/// evaluated on the last iterate.
fn solve_kepler(
    u: f64,
    axnl: f64,
    aynl: f64,
    settings: &KeplerSettings,
) -> Result<(f64, f64), PropagationError> {
    let mut eo1 = u;
    let mut step = f64::INFINITY;
    let mut iterations = 0u32;
    let (mut sineo1, mut coseo1) = (0.0, 0.0);
    while step.abs() >= settings.tolerance && iterations < settings.max_iterations {
        (sineo1, coseo1) = eo1.sin_cos();
        step = (u - aynl * coseo1 + axnl * sineo1 - eo1) / (1.0 - coseo1 * axnl - sineo1 * aynl);
        if step.abs() >= 0.95 {
            step = 0.95_f64.copysign(step);
        }
        eo1 += step;
        iterations += 1;
    }
    if step.abs() >= settings.tolerance {
        return Err(PropagationError::NonConvergent { iterations, residual: step.abs() });
    }
    Ok((sineo1, coseo1))
}

fn days_since_1950(time: DateTime<Utc>) -> f64 {
    // 1949-12-31 00:00 UTC is 7306 days before the Unix epoch.
    let secs = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    secs / 86_400.0 + 7306.0
}
