//! Expression code generation
//!
//! Values, conditional jumps and the implicit conversions the binding
//! resolver attached to each expression.

use super::gen::Gen;
use super::label::Label;
use super::opcodes::*;
use crate::ast::{CompareOp, Conversion, Expr, ExprKind, FieldRef, InvokeKind, MethodRef};
use crate::common::{Error, Result, Type, TypeCode};
use crate::consts::Constant;

impl<'a> Gen<'a> {
    /// Push the value of `expr`, converted
    pub(crate) fn gen_expr(&mut self, expr: &'a Expr) -> Result<()> {
        match &expr.constant {
            Some(constant) => self.push_constant(constant)?,
            None => self.gen_value(expr)?,
        }
        self.apply_conversion(expr)
    }

    /// Evaluate `expr` for its side effects only
    pub(crate) fn gen_expr_stmt(&mut self, expr: &'a Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Assign { target, value } => {
                self.gen_expr(value)?;
                let slot = self.slot(*target)?;
                self.code.emit_store(self.local_type(*target).type_code(), slot);
                Ok(())
            }
            ExprKind::Increment { local, delta } => {
                let slot = self.slot(*local)?;
                self.code.emit_iinc(slot, *delta);
                Ok(())
            }
            ExprKind::FieldSet {
                field,
                receiver,
                value,
            } => self.gen_field_set(field, receiver.as_deref(), value, false),
            _ => {
                self.gen_expr(expr)?;
                self.pop_value(&expr.result_type());
                Ok(())
            }
        }
    }

    pub(crate) fn pop_value(&mut self, ty: &Type) {
        match ty.width() {
            0 => {}
            1 => self.code.emit(POP),
            _ => self.code.emit(POP2),
        }
    }

    fn push_constant(&mut self, constant: &Constant) -> Result<()> {
        match constant {
            Constant::Int(v) if i16::try_from(*v).is_ok() => self.code.emit_int(*v),
            Constant::Int(v) => {
                let index = self.pool.integer(*v)?;
                self.code.emit_ldc(index, 1);
            }
            Constant::Char(c) => self.code.emit_int(*c as i32),
            Constant::Boolean(b) => self.code.emit_int(*b as i32),
            Constant::Long(0) => self.code.emit(LCONST_0),
            Constant::Long(1) => self.code.emit(LCONST_1),
            Constant::Long(v) => {
                let index = self.pool.long(*v)?;
                self.code.emit_ldc(index, 2);
            }
            Constant::Float(v) => match v.to_bits() {
                0 => self.code.emit(FCONST_0),
                bits if bits == 1.0f32.to_bits() => self.code.emit(FCONST_1),
                bits if bits == 2.0f32.to_bits() => self.code.emit(FCONST_2),
                _ => {
                    let index = self.pool.float(*v)?;
                    self.code.emit_ldc(index, 1);
                }
            },
            Constant::Double(v) => match v.to_bits() {
                0 => self.code.emit(DCONST_0),
                bits if bits == 1.0f64.to_bits() => self.code.emit(DCONST_1),
                _ => {
                    let index = self.pool.double(*v)?;
                    self.code.emit_ldc(index, 2);
                }
            },
            Constant::String(s) => {
                let index = self.pool.string(s)?;
                self.code.emit_ldc(index, 1);
            }
        }
        Ok(())
    }

    fn gen_value(&mut self, expr: &'a Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(constant) => self.push_constant(constant),
            ExprKind::Null => {
                self.code.emit(ACONST_NULL);
                Ok(())
            }
            ExprKind::This => {
                self.code.emit_load(TypeCode::Reference, 0);
                Ok(())
            }
            ExprKind::Local(local) => {
                let slot = self.slot(*local)?;
                self.code.emit_load(self.local_type(*local).type_code(), slot);
                Ok(())
            }
            ExprKind::Assign { target, value } => {
                self.gen_expr(value)?;
                let ty = self.local_type(*target);
                self.code.emit(if ty.width() == 2 { DUP2 } else { DUP });
                let slot = self.slot(*target)?;
                self.code.emit_store(ty.type_code(), slot);
                Ok(())
            }
            ExprKind::Increment { local, delta } => {
                let slot = self.slot(*local)?;
                self.code.emit_iinc(slot, *delta);
                self.code.emit_load(TypeCode::Int, slot);
                Ok(())
            }
            ExprKind::FieldGet { field, receiver } => {
                let index = self.pool.field(&field.owner, &field.name, &field.ty.descriptor())?;
                if field.is_static {
                    if let Some(receiver) = receiver {
                        self.gen_expr(receiver)?;
                        self.code.emit(POP);
                    }
                    self.code.emit_field(GETSTATIC, index, field.ty.width());
                } else {
                    self.gen_receiver(receiver.as_deref())?;
                    self.code.emit_field(GETFIELD, index, field.ty.width());
                }
                Ok(())
            }
            ExprKind::FieldSet {
                field,
                receiver,
                value,
            } => self.gen_field_set(field, receiver.as_deref(), value, true),
            ExprKind::Binary { op, lhs, rhs } => {
                let code = expr.ty.type_code();
                if matches!(code, TypeCode::Reference | TypeCode::Void) {
                    return Err(Error::internal(format!(
                        "binary {:?} on {} reached code generation",
                        op, expr.ty
                    )));
                }
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.code.emit(binary_opcode(*op, code)?);
                Ok(())
            }
            ExprKind::Compare { .. } | ExprKind::And(..) | ExprKind::Or(..) | ExprKind::Not(_) => {
                let (is_false, end) = (self.code.new_label(), self.code.new_label());
                self.gen_cond_unconverted(expr, false, is_false)?;
                self.code.emit(ICONST_1);
                self.code.jump(GOTO, end)?;
                self.code.place(is_false)?;
                self.code.emit(ICONST_0);
                self.code.place(end)
            }
            ExprKind::Invoke {
                method,
                receiver,
                args,
            } => {
                if method.kind == InvokeKind::Static {
                    if let Some(receiver) = receiver {
                        self.gen_expr(receiver)?;
                        self.code.emit(POP);
                    }
                } else {
                    self.gen_receiver(receiver.as_deref())?;
                }
                for arg in args {
                    self.gen_expr(arg)?;
                }
                self.gen_invoke_ref(method)
            }
            ExprKind::New { ctor, args } => {
                let class = self.pool.class(&ctor.owner)?;
                self.code.emit_class_op(NEW, class);
                self.code.emit(DUP);
                for arg in args {
                    self.gen_expr(arg)?;
                }
                self.gen_invoke_ref(ctor)
            }
        }
    }

    /// Explicit receiver, or `this`
    fn gen_receiver(&mut self, receiver: Option<&'a Expr>) -> Result<()> {
        match receiver {
            Some(receiver) => self.gen_expr(receiver),
            None => {
                self.code.emit_load(TypeCode::Reference, 0);
                Ok(())
            }
        }
    }

    fn gen_field_set(
        &mut self,
        field: &'a FieldRef,
        receiver: Option<&'a Expr>,
        value: &'a Expr,
        keep_value: bool,
    ) -> Result<()> {
        let index = self.pool.field(&field.owner, &field.name, &field.ty.descriptor())?;
        let wide = field.ty.width() == 2;
        if field.is_static {
            self.gen_expr(value)?;
            if keep_value {
                self.code.emit(if wide { DUP2 } else { DUP });
            }
            self.code.emit_field(PUTSTATIC, index, field.ty.width());
        } else {
            self.gen_receiver(receiver)?;
            self.gen_expr(value)?;
            if keep_value {
                self.code.emit(if wide { DUP2_X1 } else { DUP_X1 });
            }
            self.code.emit_field(PUTFIELD, index, field.ty.width());
        }
        Ok(())
    }

    /// Invoke `method` with receiver and arguments already on the stack
    pub(crate) fn gen_invoke_ref(&mut self, method: &MethodRef) -> Result<()> {
        let interface = method.kind == InvokeKind::Interface;
        let index = self
            .pool
            .method(&method.owner, &method.name, &method.descriptor, interface)?;
        let op = match method.kind {
            InvokeKind::Static => INVOKESTATIC,
            InvokeKind::Virtual => INVOKEVIRTUAL,
            InvokeKind::Special => INVOKESPECIAL,
            InvokeKind::Interface => INVOKEINTERFACE,
        };
        self.code.emit_invoke(op, index, method.arg_slots, method.ret.width());
        Ok(())
    }

    fn apply_conversion(&mut self, expr: &'a Expr) -> Result<()> {
        match &expr.conversion {
            Conversion::None => Ok(()),
            Conversion::Primitive { to } => {
                for op in primitive_conversion(&expr.ty, to) {
                    self.code.emit(op);
                }
                Ok(())
            }
            Conversion::Boxing(method) | Conversion::Unboxing(method) => self.gen_invoke_ref(method),
            Conversion::Checkcast(class) => {
                let index = self.pool.class(class)?;
                self.code.emit_class_op(CHECKCAST, index);
                Ok(())
            }
        }
    }

    // ========================================================================
    // CONDITIONS
    // ========================================================================

    /// Jump to `target` when `expr` evaluates to `jump_if`, fall through
    /// otherwise. Short-circuit operators never materialize a boolean.
    pub(crate) fn gen_cond(&mut self, expr: &'a Expr, jump_if: bool, target: Label) -> Result<()> {
        if let Some(value) = expr.constant_bool() {
            if value == jump_if {
                self.code.jump(GOTO, target)?;
            }
            return Ok(());
        }
        if !matches!(expr.conversion, Conversion::None) {
            self.gen_expr(expr)?;
            return self.code.jump(if jump_if { IFNE } else { IFEQ }, target);
        }
        self.gen_cond_unconverted(expr, jump_if, target)
    }

    /// [`Self::gen_cond`] for the value of `expr` before its conversion
    fn gen_cond_unconverted(&mut self, expr: &'a Expr, jump_if: bool, target: Label) -> Result<()> {
        match &expr.kind {
            ExprKind::Not(inner) => self.gen_cond(inner, !jump_if, target),
            ExprKind::And(lhs, rhs) => {
                if jump_if {
                    let skip = self.code.new_label();
                    self.gen_cond(lhs, false, skip)?;
                    self.gen_cond(rhs, true, target)?;
                    self.code.place(skip)
                } else {
                    self.gen_cond(lhs, false, target)?;
                    self.gen_cond(rhs, false, target)
                }
            }
            ExprKind::Or(lhs, rhs) => {
                if jump_if {
                    self.gen_cond(lhs, true, target)?;
                    self.gen_cond(rhs, true, target)
                } else {
                    let skip = self.code.new_label();
                    self.gen_cond(lhs, true, skip)?;
                    self.gen_cond(rhs, false, target)?;
                    self.code.place(skip)
                }
            }
            ExprKind::Compare { op, lhs, rhs } => self.gen_compare(*op, lhs, rhs, jump_if, target),
            _ => {
                self.gen_expr(expr)?;
                self.code.jump(if jump_if { IFNE } else { IFEQ }, target)
            }
        }
    }

    fn gen_compare(
        &mut self,
        op: CompareOp,
        lhs: &'a Expr,
        rhs: &'a Expr,
        jump_if: bool,
        target: Label,
    ) -> Result<()> {
        let test = if jump_if { op } else { op.negate() };
        match lhs.result_type().type_code() {
            TypeCode::Int => {
                if is_int_zero(rhs) {
                    self.gen_expr(lhs)?;
                    self.code.jump(zero_jump(test), target)
                } else {
                    self.gen_expr(lhs)?;
                    self.gen_expr(rhs)?;
                    self.code.jump(IF_ICMPEQ + (zero_jump(test) - IFEQ), target)
                }
            }
            TypeCode::Long => {
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.code.emit(LCMP);
                self.code.jump(zero_jump(test), target)
            }
            code @ (TypeCode::Float | TypeCode::Double) => {
                // NaN must make the source comparison false
                let nan_high = matches!(op, CompareOp::Lt | CompareOp::Le);
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                self.code.emit(match (code, nan_high) {
                    (TypeCode::Float, true) => FCMPG,
                    (TypeCode::Float, false) => FCMPL,
                    (_, true) => DCMPG,
                    (_, false) => DCMPL,
                });
                self.code.jump(zero_jump(test), target)
            }
            TypeCode::Reference => {
                let equal = match test {
                    CompareOp::Eq => true,
                    CompareOp::Ne => false,
                    _ => return Err(Error::internal(format!("reference comparison {:?}", op))),
                };
                let null_side = match (&lhs.kind, &rhs.kind) {
                    (_, ExprKind::Null) => Some(lhs),
                    (ExprKind::Null, _) => Some(rhs),
                    _ => None,
                };
                match null_side {
                    Some(operand) => {
                        self.gen_expr(operand)?;
                        self.code.jump(if equal { IFNULL } else { IFNONNULL }, target)
                    }
                    None => {
                        self.gen_expr(lhs)?;
                        self.gen_expr(rhs)?;
                        self.code.jump(if equal { IF_ACMPEQ } else { IF_ACMPNE }, target)
                    }
                }
            }
            TypeCode::Void => Err(Error::internal("comparison of void values")),
        }
    }
}

fn is_int_zero(expr: &Expr) -> bool {
    matches!(expr.conversion, Conversion::None)
        && expr.constant.as_ref().and_then(Constant::as_int) == Some(0)
}

/// `ifXX` comparing the top of stack against zero
fn zero_jump(op: CompareOp) -> u8 {
    match op {
        CompareOp::Eq => IFEQ,
        CompareOp::Ne => IFNE,
        CompareOp::Lt => IFLT,
        CompareOp::Ge => IFGE,
        CompareOp::Gt => IFGT,
        CompareOp::Le => IFLE,
    }
}

/// Arithmetic opcodes are laid out int, long, float, double per operation;
/// shifts and bitwise operations exist for int and long only.
fn binary_opcode(op: crate::ast::BinaryOp, code: TypeCode) -> Result<u8> {
    use crate::ast::BinaryOp::*;
    let offset = match code {
        TypeCode::Int => 0,
        TypeCode::Long => 1,
        TypeCode::Float => 2,
        _ => 3,
    };
    let base = match op {
        Add => IADD,
        Sub => ISUB,
        Mul => IMUL,
        Div => IDIV,
        Rem => IREM,
        Shl | Shr | Ushr | BitAnd | BitOr | BitXor if offset > 1 => {
            return Err(Error::internal(format!("{:?} on a floating-point operand", op)))
        }
        Shl => ISHL,
        Shr => ISHR,
        Ushr => IUSHR,
        BitAnd => IAND,
        BitOr => IOR,
        BitXor => IXOR,
    };
    Ok(base + offset)
}

/// Opcodes converting a `from` value to `to`
fn primitive_conversion(from: &Type, to: &Type) -> Vec<u8> {
    let mut ops = Vec::with_capacity(2);
    let widened = match (from.type_code(), to.type_code()) {
        (TypeCode::Int, TypeCode::Long) => Some(I2L),
        (TypeCode::Int, TypeCode::Float) => Some(I2F),
        (TypeCode::Int, TypeCode::Double) => Some(I2D),
        (TypeCode::Long, TypeCode::Int) => Some(L2I),
        (TypeCode::Long, TypeCode::Float) => Some(L2F),
        (TypeCode::Long, TypeCode::Double) => Some(L2D),
        (TypeCode::Float, TypeCode::Int) => Some(F2I),
        (TypeCode::Float, TypeCode::Long) => Some(F2L),
        (TypeCode::Float, TypeCode::Double) => Some(F2D),
        (TypeCode::Double, TypeCode::Int) => Some(D2I),
        (TypeCode::Double, TypeCode::Long) => Some(D2L),
        (TypeCode::Double, TypeCode::Float) => Some(D2F),
        _ => None,
    };
    ops.extend(widened);
    match to {
        Type::Byte if *from != Type::Byte => ops.push(I2B),
        Type::Char if *from != Type::Char => ops.push(I2C),
        Type::Short if !matches!(from, Type::Short | Type::Byte) => ops.push(I2S),
        _ => {}
    }
    ops
}
