//! Expression side of the flow pass: reads, assignments, thrown types and
//! short-circuit conditions.

use crate::ast::{Expr, ExprKind, FieldRef, LocalId, MethodKind, Span};
use crate::common::ProblemKind;
use crate::wash::flow::FlowAnalyzer;
use crate::wash::flow_info::{ConditionalFlow, FlowInfo};

impl<'a> FlowAnalyzer<'a> {
    pub fn analyze_expr(&mut self, expr: &mut Expr, flow: FlowInfo) -> FlowInfo {
        if is_condition(expr) {
            return self.analyze_condition(expr, flow).unconditional_inits();
        }
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::Null | ExprKind::This => flow,

            ExprKind::Local(local) => {
                self.check_read(*local, &flow, span);
                flow
            }

            ExprKind::Assign { target, value } => {
                let target = *target;
                let mut flow = self.analyze_expr(value, flow);
                self.check_assign(target, &flow, span);
                flow.mark_assigned(target);
                flow
            }

            ExprKind::Increment { local, .. } => {
                let local = *local;
                self.check_read(local, &flow, span);
                let mut flow = flow;
                self.check_assign(local, &flow, span);
                flow.mark_assigned(local);
                flow
            }

            ExprKind::FieldGet { receiver, .. } => match receiver {
                Some(receiver) => self.analyze_expr(receiver, flow),
                None => flow,
            },

            ExprKind::FieldSet {
                field,
                receiver,
                value,
            } => {
                let flow = match receiver {
                    Some(receiver) => self.analyze_expr(receiver, flow),
                    None => flow,
                };
                let flow = self.analyze_expr(value, flow);
                if field.is_final {
                    self.check_final_field(field, span);
                }
                flow
            }

            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Compare { lhs, rhs, .. } => {
                let flow = self.analyze_expr(lhs, flow);
                self.analyze_expr(rhs, flow)
            }

            ExprKind::And(..) | ExprKind::Or(..) | ExprKind::Not(..) => flow,

            ExprKind::Invoke {
                method,
                receiver,
                args,
            } => {
                let mut flow = match receiver {
                    Some(receiver) => self.analyze_expr(receiver, flow),
                    None => flow,
                };
                for arg in args.iter_mut() {
                    flow = self.analyze_expr(arg, flow);
                }
                for class in &method.thrown {
                    self.record_thrown(class, &flow, span);
                }
                flow
            }

            ExprKind::New { ctor, args } => {
                let mut flow = flow;
                for arg in args.iter_mut() {
                    flow = self.analyze_expr(arg, flow);
                }
                for class in &ctor.thrown {
                    self.record_thrown(class, &flow, span);
                }
                flow
            }
        }
    }

    /// Split flow on a boolean expression. A constant condition makes the
    /// impossible side silently unreachable.
    pub fn analyze_condition(&mut self, expr: &mut Expr, flow: FlowInfo) -> ConditionalFlow {
        let constant = expr.constant_bool();
        if !is_condition(expr) {
            let split = ConditionalFlow::both(self.analyze_expr(expr, flow));
            return constant_split(constant, split);
        }
        let split = match &mut expr.kind {
            ExprKind::And(lhs, rhs) => {
                let left = self.analyze_condition(lhs, flow);
                let right = self.analyze_condition(rhs, left.when_true);
                ConditionalFlow {
                    when_true: right.when_true,
                    when_false: left.when_false.merged_with(&right.when_false),
                }
            }
            ExprKind::Or(lhs, rhs) => {
                let left = self.analyze_condition(lhs, flow);
                let right = self.analyze_condition(rhs, left.when_false);
                ConditionalFlow {
                    when_true: left.when_true.merged_with(&right.when_true),
                    when_false: right.when_false,
                }
            }
            ExprKind::Not(inner) => self.analyze_condition(inner, flow).swapped(),
            _ => ConditionalFlow::both(flow),
        };
        constant_split(constant, split)
    }

    fn check_read(&mut self, local: LocalId, flow: &FlowInfo, span: Span) {
        if flow.is_reachable() && !flow.is_definitely_assigned(local) {
            let name = self.local_name(local);
            self.report(ProblemKind::UninitializedLocal { name }, span);
        }
    }

    fn check_assign(&mut self, local: LocalId, flow: &FlowInfo, span: Span) {
        if !self.is_final_local(local) {
            return;
        }
        if flow.is_possibly_assigned(local) {
            let name = self.local_name(local);
            self.report(ProblemKind::FinalLocalAlreadyAssigned { name }, span);
        } else {
            self.contexts.defer_final_check(local, span);
        }
    }

    /// Final fields may only be set by the declaring class's constructors
    /// and initializers of the matching staticness.
    fn check_final_field(&mut self, field: &FieldRef, span: Span) {
        let own = field.owner == self.owner;
        let allowed = own
            && match self.kind {
                MethodKind::Constructor => !field.is_static,
                MethodKind::Initializer => field.is_static == self.is_static,
                MethodKind::Method => false,
            };
        if !allowed {
            self.report(
                ProblemKind::FinalFieldAssignment {
                    name: field.name.clone(),
                },
                span,
            );
        }
    }
}

fn is_condition(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::And(..) | ExprKind::Or(..) | ExprKind::Not(..))
}

fn constant_split(constant: Option<bool>, split: ConditionalFlow) -> ConditionalFlow {
    match constant {
        Some(true) => ConditionalFlow {
            when_false: split.when_false.unreachable(),
            when_true: split.when_true,
        },
        Some(false) => ConditionalFlow {
            when_true: split.when_true.unreachable(),
            when_false: split.when_false,
        },
        None => split,
    }
}
